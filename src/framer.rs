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

//! Byte-at-a-time reassembly of `$<payload>#<xx>` packets.
//!
//! The framer never sends anything itself. It reports completed packets and
//! interrupts, and the server decides how to acknowledge them.

use log::{trace, warn};

use crate::packet::{PacketBuffer, INTERRUPT, MAX_PACKET_LEN, PACKET_END, PACKET_START};
use crate::utils::hex_digit_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Accumulating,
    ReadingChecksum,
}

/// A syntactically complete packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub body: Vec<u8>,
    /// Checksum we computed over `body`.
    pub computed: u8,
    /// Checksum sent by the peer, `None` if the two digits were not hex.
    pub received: Option<u8>,
}

impl RawPacket {
    pub fn checksum_ok(&self) -> bool {
        self.received == Some(self.computed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Packet(RawPacket),
    /// A bare 0x03 seen outside of any packet.
    Interrupt,
}

#[derive(Debug)]
pub struct Framer {
    state: FrameState,
    buffer: PacketBuffer,
    digits: [u8; 2],
    digit_count: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PACKET_LEN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: FrameState::Idle,
            buffer: PacketBuffer::with_capacity(capacity),
            digits: [0; 2],
            digit_count: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Drop any partial packet and go back to `Idle`.
    pub fn reset(&mut self) {
        self.state = FrameState::Idle;
        self.buffer.clear();
        self.digit_count = 0;
    }

    /// Feed a received chunk, returning every event it completes, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Advance the state machine by one byte.
    pub fn push(&mut self, byte: u8) -> Option<FrameEvent> {
        match self.state {
            FrameState::Idle => {
                if byte == PACKET_START {
                    self.buffer.clear();
                    self.state = FrameState::Accumulating;
                } else if byte == INTERRUPT {
                    return Some(FrameEvent::Interrupt);
                } else {
                    // Acks from the client and line noise land here.
                    trace!("Discarding idle byte 0x{:02x}", byte);
                }
                None
            }
            FrameState::Accumulating => {
                if byte == PACKET_END {
                    self.digit_count = 0;
                    self.state = FrameState::ReadingChecksum;
                } else if self.buffer.push(byte).is_err() {
                    warn!(
                        "Dropping packet longer than {} bytes",
                        self.buffer.len()
                    );
                    self.reset();
                }
                None
            }
            FrameState::ReadingChecksum => {
                self.digits[self.digit_count] = byte;
                self.digit_count += 1;
                if self.digit_count < self.digits.len() {
                    return None;
                }
                let received = match (
                    hex_digit_value(self.digits[0]),
                    hex_digit_value(self.digits[1]),
                ) {
                    (Some(hi), Some(lo)) => Some((hi << 4) | lo),
                    _ => None,
                };
                let computed = self.buffer.checksum();
                let body = self.buffer.take();
                self.reset();
                Some(FrameEvent::Packet(RawPacket {
                    body,
                    computed,
                    received,
                }))
            }
        }
    }
}
