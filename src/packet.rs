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

/// RSP packet envelope: `$<payload>#<checksum>`.
use crate::error::StubError;

/// Largest payload accepted between `$` and `#` on the inbound side. This is
/// also what `qSupported` advertises; GDB reads `PacketSize` as hex.
pub const MAX_PACKET_LEN: usize = 0x1024;

/// Largest framed packet (`$`, payload, `#`, two digits) we will send.
pub const MAX_FRAMED_LEN: usize = 2048;

/// Largest reply payload that still fits in `MAX_FRAMED_LEN` once framed.
pub const MAX_REPLY_LEN: usize = MAX_FRAMED_LEN - 4;

pub const PACKET_START: u8 = b'$';
pub const PACKET_END: u8 = b'#';
pub const INTERRUPT: u8 = 0x03;
pub const ACK: u8 = b'+';
pub const NACK: u8 = b'-';

/// The RSP checksum: additive sum of every byte, modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc.wrapping_add(b))
}

/// Wrap `data` as `$<data>#<xx>` with a lowercase hex checksum.
///
/// Fails without producing anything when the framed packet would exceed
/// `MAX_FRAMED_LEN`.
pub fn encode(data: &[u8]) -> Result<Vec<u8>, StubError> {
    if data.len() > MAX_REPLY_LEN {
        return Err(StubError::PacketTooLarge {
            len: data.len(),
            max: MAX_REPLY_LEN,
        });
    }
    let mut out = Vec::with_capacity(data.len() + 4);
    out.push(PACKET_START);
    out.extend_from_slice(data);
    out.push(PACKET_END);
    out.extend_from_slice(format!("{:02x}", checksum(data)).as_bytes());
    Ok(out)
}

/// Returned by `PacketBuffer::push` when the buffer is already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

/// Payload bytes collected between `$` and `#`, with a running checksum.
///
/// The running checksum always equals `checksum(self.as_bytes())`.
#[derive(Debug)]
pub struct PacketBuffer {
    bytes: Vec<u8>,
    sum: u8,
    capacity: usize,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_PACKET_LEN)
    }
}

impl PacketBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            sum: 0,
            capacity,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), Overflow> {
        if self.bytes.len() >= self.capacity {
            return Err(Overflow);
        }
        self.bytes.push(byte);
        self.sum = self.sum.wrapping_add(byte);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.sum = 0;
    }

    pub fn checksum(&self) -> u8 {
        self.sum
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hand the payload out and leave the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        self.sum = 0;
        std::mem::replace(&mut self.bytes, Vec::with_capacity(self.capacity))
    }
}
