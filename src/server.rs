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

//! The stub itself: owns the transport, the target and at most one session,
//! and is driven by repeated calls to `tick`.

use std::net::SocketAddr;

use log::{debug, info, warn};

use crate::config::{ChecksumPolicy, StubConfig, UnknownCommandReply};
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::StubError;
use crate::framer::{FrameEvent, FrameState, Framer, RawPacket};
use crate::packet::{self, ACK, NACK};
use crate::target::Target;
use crate::transport::{Received, TcpTransport, Transport};

/// Bytes read from the client per tick.
pub const RECV_CHUNK_LEN: usize = 4096;

/// Per-connection state. Dropped on detach, peer close or I/O error, so a new
/// connection always starts with a fresh framer.
#[derive(Debug)]
struct Session {
    peer: SocketAddr,
    framer: Framer,
}

pub struct GdbStub<T, X = TcpTransport> {
    transport: X,
    target: T,
    dispatcher: Dispatcher,
    checksum_policy: ChecksumPolicy,
    unknown_command_reply: UnknownCommandReply,
    session: Option<Session>,
    recv_buf: Vec<u8>,
}

impl<T: Target> GdbStub<T, TcpTransport> {
    /// Bind and listen on the configured address.
    pub fn init(config: StubConfig, target: T) -> Result<Self, StubError> {
        let transport = TcpTransport::bind(config.socket_addr())?;
        match transport.local_addr() {
            Ok(addr) => info!("Listening for gdb on {}", addr),
            Err(_) => info!("Listening for gdb on port {}", config.port),
        }
        Ok(Self::with_transport(config, target, transport))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }
}

impl<T: Target, X: Transport> GdbStub<T, X> {
    pub fn with_transport(config: StubConfig, target: T, transport: X) -> Self {
        Self {
            transport,
            target,
            dispatcher: Dispatcher::new(config.target_description, config.memory_map),
            checksum_policy: config.checksum_policy,
            unknown_command_reply: config.unknown_command_reply,
            session: None,
            recv_buf: vec![0; RECV_CHUNK_LEN],
        }
    }

    /// Drive one iteration: accept a client if there is none, otherwise push
    /// out queued replies, read whatever the client sent and dispatch every
    /// packet it completes.
    pub fn tick(&mut self) {
        if self.session.is_none() {
            self.try_accept();
            return;
        }
        if let Err(e) = self.transport.flush() {
            self.teardown(&format!("lost gdb connection: {}", e));
            return;
        }
        self.receive();
    }

    /// Close the session (if any) and release the listener. Hands the target
    /// back to the caller.
    pub fn terminate(mut self) -> T {
        self.teardown("stub terminated");
        self.target
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Framing state of the live session, `None` without a client.
    pub fn framing_state(&self) -> Option<FrameState> {
        self.session.as_ref().map(|s| s.framer.state())
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut X {
        &mut self.transport
    }

    fn try_accept(&mut self) {
        match self.transport.accept() {
            Ok(Some(peer)) => {
                info!("Accepted gdb connection from {}", peer);
                self.session = Some(Session {
                    peer,
                    framer: Framer::new(),
                });
                self.target.connected();
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to accept gdb connection: {}", e),
        }
    }

    fn receive(&mut self) {
        let n = match self.transport.receive(&mut self.recv_buf) {
            Ok(Received::Data(n)) => n,
            Ok(Received::Empty) => return,
            Ok(Received::Closed) => {
                self.teardown("gdb closed the connection");
                return;
            }
            Err(e) => {
                self.teardown(&format!("lost gdb connection: {}", e));
                return;
            }
        };

        let events = match self.session.as_mut() {
            Some(session) => session.framer.feed(&self.recv_buf[..n]),
            None => return,
        };
        for event in events {
            if !self.handle_event(event) {
                // Whatever followed in this chunk belonged to the old session.
                break;
            }
        }
    }

    /// Returns false once the session is gone.
    fn handle_event(&mut self, event: FrameEvent) -> bool {
        let outcome = match event {
            FrameEvent::Interrupt => self.dispatcher.interrupt(&mut self.target),
            FrameEvent::Packet(raw) => {
                if !self.acknowledge(&raw) {
                    return self.session.is_some();
                }
                self.dispatcher.dispatch(&raw.body, &mut self.target)
            }
        };
        self.apply(outcome);
        self.session.is_some()
    }

    /// Send the ack byte. Returns whether the packet should be dispatched.
    fn acknowledge(&mut self, raw: &RawPacket) -> bool {
        if !raw.checksum_ok() {
            warn!(
                "Checksum mismatch on '{}': computed {:02x}, received {}",
                String::from_utf8_lossy(&raw.body),
                raw.computed,
                raw.received
                    .map(|c| format!("{:02x}", c))
                    .unwrap_or_else(|| "non-hex digits".to_string())
            );
            if self.checksum_policy == ChecksumPolicy::Strict {
                self.send_raw(&[NACK]);
                return false;
            }
        }
        self.send_raw(&[ACK]);
        self.session.is_some()
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Reply(payload) => self.send_packet(&payload),
            Outcome::NoReply => {}
            Outcome::Detach => {
                self.send_packet(b"OK");
                self.teardown("gdb detached");
            }
            Outcome::Unknown => {
                if self.unknown_command_reply == UnknownCommandReply::Empty {
                    self.send_packet(b"");
                }
            }
        }
    }

    fn send_packet(&mut self, payload: &[u8]) {
        match packet::encode(payload) {
            Ok(bytes) => {
                debug!("Sending {}", String::from_utf8_lossy(&bytes));
                self.send_raw(&bytes);
            }
            Err(e) => warn!("Dropping reply: {}", e),
        }
    }

    fn send_raw(&mut self, bytes: &[u8]) {
        if self.session.is_none() {
            return;
        }
        if let Err(e) = self.transport.send(bytes) {
            self.teardown(&format!("lost gdb connection: {}", e));
        }
    }

    fn teardown(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            info!("Closing gdb session with {}: {}", session.peer, reason);
            self.transport.disconnect();
            self.target.disconnected();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Capability;
    use std::collections::VecDeque;

    /// Scripted transport: one pending connection per `connect()`, inbound
    /// chunks queued by the test, everything sent recorded.
    #[derive(Default)]
    struct MockTransport {
        pending: usize,
        connected: bool,
        inbox: VecDeque<Option<Vec<u8>>>,
        sent: Vec<u8>,
        fail_sends: bool,
        fail_receive: bool,
        fail_flush: bool,
        flushes: usize,
    }

    impl MockTransport {
        fn connect(&mut self) {
            self.pending += 1;
        }

        fn push(&mut self, bytes: &[u8]) {
            self.inbox.push_back(Some(bytes.to_vec()));
        }

        fn close_from_peer(&mut self) {
            self.inbox.push_back(None);
        }

        fn take_sent(&mut self) -> String {
            String::from_utf8(std::mem::take(&mut self.sent)).unwrap()
        }
    }

    impl Transport for MockTransport {
        fn accept(&mut self) -> Result<Option<SocketAddr>, StubError> {
            if self.connected || self.pending == 0 {
                return Ok(None);
            }
            self.pending -= 1;
            self.connected = true;
            Ok(Some("127.0.0.1:40000".parse().unwrap()))
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<Received, StubError> {
            if self.fail_receive {
                return Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset).into());
            }
            match self.inbox.pop_front() {
                Some(Some(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(Received::Data(bytes.len()))
                }
                Some(None) => Ok(Received::Closed),
                None => Ok(Received::Empty),
            }
        }

        fn send(&mut self, bytes: &[u8]) -> Result<(), StubError> {
            if !self.connected {
                return Ok(());
            }
            if self.fail_sends {
                return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
            }
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), StubError> {
            self.flushes += 1;
            if self.fail_flush {
                return Err(std::io::Error::from(std::io::ErrorKind::WouldBlock).into());
            }
            Ok(())
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Target for Recorder {
        fn connected(&mut self) -> Capability {
            self.calls.push("connected".into());
            Capability::Done(())
        }
        fn disconnected(&mut self) -> Capability {
            self.calls.push("disconnected".into());
            Capability::Done(())
        }
        fn stop(&mut self) -> Capability {
            self.calls.push("stop".into());
            Capability::Done(())
        }
        fn set_breakpoint(&mut self, address: u32) -> Capability {
            self.calls.push(format!("set {:x}", address));
            Capability::Done(())
        }
    }

    fn stub(config: StubConfig) -> GdbStub<Recorder, MockTransport> {
        GdbStub::with_transport(config, Recorder::default(), MockTransport::default())
    }

    fn connected_stub(config: StubConfig) -> GdbStub<Recorder, MockTransport> {
        let mut s = stub(config);
        s.transport_mut().connect();
        s.tick();
        assert!(s.is_connected());
        s
    }

    #[test]
    fn tick_without_client_does_nothing() {
        let mut s = stub(StubConfig::default());
        s.tick();
        s.tick();
        assert!(!s.is_connected());
        assert_eq!(s.framing_state(), None);
        assert!(s.target().calls.is_empty());
    }

    #[test]
    fn accept_notifies_target() {
        let s = connected_stub(StubConfig::default());
        assert_eq!(s.target().calls, vec!["connected"]);
        assert_eq!(s.framing_state(), Some(FrameState::Idle));
    }

    #[test]
    fn qsupported_gets_ack_and_reply() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().push(b"$qSupported#37");
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$PacketSize=1024#f7");
    }

    #[test]
    fn set_breakpoint_round_trip() {
        let mut s = connected_stub(StubConfig::default());
        let framed = packet::encode(b"Z0,1000").unwrap();
        s.transport_mut().push(&framed);
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$OK#9a");
        assert_eq!(s.target().calls, vec!["connected", "set 1000"]);
    }

    #[test]
    fn packet_split_across_ticks() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().push(b"$qSupp");
        s.tick();
        assert_eq!(s.framing_state(), Some(FrameState::Accumulating));
        assert!(s.transport().sent.is_empty());
        s.transport_mut().push(b"orted#3");
        s.tick();
        assert_eq!(s.framing_state(), Some(FrameState::ReadingChecksum));
        s.transport_mut().push(b"7");
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$PacketSize=1024#f7");
    }

    #[test]
    fn permissive_checksum_still_dispatches() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().push(b"$?#00");
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$S00#b3");
        assert_eq!(s.target().calls, vec!["connected", "stop"]);
    }

    #[test]
    fn strict_checksum_asks_for_retransmit() {
        let config = StubConfig {
            checksum_policy: ChecksumPolicy::Strict,
            ..StubConfig::default()
        };
        let mut s = connected_stub(config);
        s.transport_mut().push(b"$?#00$?#3f");
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "-+$S00#b3");
        assert_eq!(s.target().calls, vec!["connected", "stop"]);
    }

    #[test]
    fn unknown_command_is_silent_by_default() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().push(&packet::encode(b"Q_bogus").unwrap());
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+");
        assert_eq!(s.target().calls, vec!["connected"]);
    }

    #[test]
    fn unknown_command_can_get_empty_reply() {
        let config = StubConfig {
            unknown_command_reply: UnknownCommandReply::Empty,
            ..StubConfig::default()
        };
        let mut s = connected_stub(config);
        s.transport_mut().push(&packet::encode(b"Q_bogus").unwrap());
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$#00");
    }

    #[test]
    fn interrupt_byte_stops_target() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().push(&[0x03]);
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "$S02#b5");
        assert_eq!(s.target().calls, vec!["connected", "stop"]);
    }

    #[test]
    fn detach_ends_session_and_allows_reconnect() {
        let mut s = connected_stub(StubConfig::default());
        // Trailing bytes after the detach belong to the dead session.
        s.transport_mut().push(b"$D#44$qS");
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$OK#9a");
        assert!(!s.is_connected());
        assert_eq!(s.target().calls, vec!["connected", "disconnected"]);

        s.transport_mut().connect();
        s.tick();
        assert!(s.is_connected());
        assert_eq!(s.framing_state(), Some(FrameState::Idle));

        s.transport_mut().push(b"$?#3f");
        s.tick();
        assert_eq!(s.transport_mut().take_sent(), "+$S00#b3");
    }

    #[test]
    fn peer_close_tears_down() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().push(b"$qSu");
        s.tick();
        s.transport_mut().close_from_peer();
        s.tick();
        assert!(!s.is_connected());
        assert!(!s.transport().connected);
        assert_eq!(s.target().calls, vec!["connected", "disconnected"]);
    }

    #[test]
    fn receive_error_tears_down() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().fail_receive = true;
        s.tick();
        assert!(!s.is_connected());
        assert_eq!(s.target().calls, vec!["connected", "disconnected"]);
    }

    #[test]
    fn send_error_tears_down() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().fail_sends = true;
        s.transport_mut().push(b"$?#3f$?#3f");
        s.tick();
        assert!(!s.is_connected());
        // The ack failed, so nothing was dispatched.
        assert_eq!(s.target().calls, vec!["connected", "disconnected"]);
    }

    #[test]
    fn queued_replies_are_flushed_each_tick() {
        let mut s = connected_stub(StubConfig::default());
        s.tick();
        s.tick();
        assert_eq!(s.transport().flushes, 2);
    }

    #[test]
    fn stalled_client_is_dropped() {
        let mut s = connected_stub(StubConfig::default());
        s.transport_mut().fail_flush = true;
        s.transport_mut().push(b"$?#3f");
        s.tick();
        assert!(!s.is_connected());
        assert!(!s.transport().connected);
        assert!(s.transport().sent.is_empty());
        assert_eq!(s.target().calls, vec!["connected", "disconnected"]);
    }

    #[test]
    fn terminate_disconnects_and_returns_target() {
        let s = connected_stub(StubConfig::default());
        let target = s.terminate();
        assert_eq!(target.calls, vec!["connected", "disconnected"]);
    }

    #[test]
    fn terminate_without_session() {
        let s = stub(StubConfig::default());
        assert!(s.terminate().calls.is_empty());
    }
}
