// Copyright (c) 2026 MCU-Debug Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use log::debug;

use crate::error::StubError;

/// Result of one non-blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// This many bytes were written to the front of the buffer.
    Data(usize),
    /// Nothing available right now.
    Empty,
    /// The peer closed the connection.
    Closed,
}

/// Outbound bytes the socket has not taken yet. A peer that lets this fill up
/// has stopped reading.
pub const MAX_PENDING_LEN: usize = 16 * 1024;

/// Listening socket plus at most one client connection. Nothing here blocks.
pub trait Transport {
    /// Accept a pending connection if there is one and no client is connected.
    fn accept(&mut self) -> Result<Option<SocketAddr>, StubError>;

    fn receive(&mut self, buf: &mut [u8]) -> Result<Received, StubError>;

    /// Queue `bytes` for the client and write what the socket takes right
    /// now. Without a client this does nothing.
    fn send(&mut self, bytes: &[u8]) -> Result<(), StubError>;

    /// Retry writing queued bytes. Called once per tick.
    fn flush(&mut self) -> Result<(), StubError> {
        Ok(())
    }

    /// Drop the client connection, if any. The listener stays open.
    fn disconnect(&mut self);
}

// Non-blocking TCP transport (bind-and-accept)
pub struct TcpTransport {
    listener: TcpListener,
    client: Option<TcpStream>,
    outbox: Vec<u8>,
}

impl TcpTransport {
    /// Bind to `addr` and start listening. Port 0 picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self, StubError> {
        let to_bind_error = |source: io::Error| StubError::Bind { addr, source };
        let listener = TcpListener::bind(addr).map_err(to_bind_error)?;
        listener.set_nonblocking(true).map_err(to_bind_error)?;
        Ok(Self {
            listener,
            client: None,
            outbox: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Bytes queued for the client but not yet written.
    pub fn pending_len(&self) -> usize {
        self.outbox.len()
    }
}

impl Transport for TcpTransport {
    fn accept(&mut self) -> Result<Option<SocketAddr>, StubError> {
        if self.client.is_some() {
            return Ok(None);
        }
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                self.client = Some(stream);
                self.outbox.clear();
                Ok(Some(peer))
            }
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<Received, StubError> {
        let Some(stream) = self.client.as_mut() else {
            return Ok(Received::Empty);
        };
        match stream.read(buf) {
            Ok(0) => Ok(Received::Closed),
            Ok(n) => Ok(Received::Data(n)),
            Err(e) if is_transient(&e) => Ok(Received::Empty),
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), StubError> {
        if self.client.is_none() {
            debug!("No client, dropping {} bytes", bytes.len());
            return Ok(());
        }
        self.flush()?;
        let Some(stream) = self.client.as_mut() else {
            return Ok(());
        };
        // Earlier bytes still queued go out first.
        let written = if self.outbox.is_empty() {
            write_some(stream, bytes)?
        } else {
            0
        };
        let rest = &bytes[written..];
        if self.outbox.len() + rest.len() > MAX_PENDING_LEN {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("client is not reading, {} bytes queued", self.outbox.len()),
            )
            .into());
        }
        if !rest.is_empty() {
            debug!("Socket full, queueing {} bytes", rest.len());
            self.outbox.extend_from_slice(rest);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StubError> {
        let Some(stream) = self.client.as_mut() else {
            self.outbox.clear();
            return Ok(());
        };
        if self.outbox.is_empty() {
            return Ok(());
        }
        let written = write_some(stream, &self.outbox)?;
        self.outbox.drain(..written);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.outbox.clear();
        if let Some(stream) = self.client.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

/// Write as much of `bytes` as the socket accepts without blocking.
fn write_some(stream: &mut TcpStream, bytes: &[u8]) -> Result<usize, StubError> {
    let mut sent = 0;
    while sent < bytes.len() {
        match stream.write(&bytes[sent..]) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(sent)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
