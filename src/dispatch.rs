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

/// Command dispatch: turns a packet body into target calls and a reply.
use log::{debug, warn};

use crate::command::{Breakpoint, Command, MemoryRange, Query, XferRange};
use crate::packet::{MAX_PACKET_LEN, MAX_REPLY_LEN};
use crate::target::{Capability, Target};
use crate::utils::{escape_binary, hex_encode_bounded};

/// What the server should do after a packet has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this payload as a packet.
    Reply(Vec<u8>),
    /// Nothing to send now; the target reports back later (`c`, `s`).
    NoReply,
    /// Send `OK`, then end the session.
    Detach,
    /// Not a command we implement.
    Unknown,
}

impl Outcome {
    fn reply(payload: impl Into<Vec<u8>>) -> Self {
        Outcome::Reply(payload.into())
    }

    fn empty() -> Self {
        Outcome::Reply(Vec::new())
    }
}

#[derive(Debug, Default, Clone)]
pub struct Dispatcher {
    target_description: Option<String>,
    memory_map: Option<String>,
}

impl Dispatcher {
    pub fn new(target_description: Option<String>, memory_map: Option<String>) -> Self {
        Self {
            target_description,
            memory_map,
        }
    }

    /// Dispatch one complete packet body.
    pub fn dispatch<T: Target + ?Sized>(&self, body: &[u8], target: &mut T) -> Outcome {
        debug!("Processing {}", String::from_utf8_lossy(body));

        let outcome = match Command::parse(body) {
            Command::Continue => {
                target.start();
                Outcome::NoReply
            }
            Command::Detach => Outcome::Detach,
            Command::ReadRegisters => handle_read_registers(target),
            Command::SetThread => Outcome::reply("OK"),
            Command::ReadRegister(index) => handle_read_register(index, target),
            Command::ReadMemory(range) => handle_read_memory(range, target),
            Command::Query(query) => self.handle_query(query),
            Command::Step => {
                target.step();
                Outcome::NoReply
            }
            Command::MultiLetter => Outcome::empty(),
            Command::InsertBreakpoint(bp) => handle_breakpoint(bp, target, true),
            Command::RemoveBreakpoint(bp) => handle_breakpoint(bp, target, false),
            Command::StopReason => {
                target.stop();
                Outcome::reply("S00")
            }
            Command::Unknown => Outcome::Unknown,
        };
        if outcome == Outcome::Unknown {
            warn!("Unknown gdb command '{}'", String::from_utf8_lossy(body));
        }
        outcome
    }

    /// A bare interrupt byte arrived: halt the target and report SIGINT.
    pub fn interrupt<T: Target + ?Sized>(&self, target: &mut T) -> Outcome {
        debug!("Interrupt requested");
        target.stop();
        Outcome::reply("S02")
    }

    fn supported_features(&self) -> String {
        let mut reply = format!("PacketSize={:x}", MAX_PACKET_LEN);
        if self.target_description.is_some() {
            reply.push_str(";qXfer:features:read+");
        }
        if self.memory_map.is_some() {
            reply.push_str(";qXfer:memory-map:read+");
        }
        reply
    }

    fn handle_query(&self, query: Query) -> Outcome {
        match query {
            Query::Supported => Outcome::reply(self.supported_features()),
            // No threads: report a constant id.
            Query::CurrentThread => Outcome::reply("QC00"),
            Query::Attached => Outcome::reply("1"),
            Query::TraceStatus => Outcome::reply("T0"),
            Query::Tracepoints => Outcome::empty(),
            Query::ThreadInfoFirst => Outcome::reply("lm0"),
            Query::ReadFeatures(range) => xfer_reply(self.target_description.as_deref(), range),
            Query::ReadMemoryMap(range) => xfer_reply(self.memory_map.as_deref(), range),
            Query::Unknown => Outcome::Unknown,
        }
    }
}

fn handle_read_registers<T: Target + ?Sized>(target: &mut T) -> Outcome {
    match target.read_registers() {
        Capability::Done(bytes) => Outcome::reply(bounded_hex(&bytes, "register file")),
        Capability::Unsupported => Outcome::empty(),
    }
}

fn handle_read_register<T: Target + ?Sized>(index: Option<usize>, target: &mut T) -> Outcome {
    let Some(index) = index else {
        return Outcome::empty();
    };
    match target.read_register(index) {
        Capability::Done(bytes) => Outcome::reply(bounded_hex(&bytes, "register")),
        Capability::Unsupported => Outcome::empty(),
    }
}

fn handle_read_memory<T: Target + ?Sized>(range: Option<MemoryRange>, target: &mut T) -> Outcome {
    let Some(MemoryRange { address, length }) = range else {
        return Outcome::reply("E01");
    };
    let length = length.min(MAX_REPLY_LEN / 2);
    match target.read_memory(address, length) {
        Capability::Done(mut bytes) => {
            bytes.truncate(length);
            Outcome::reply(bounded_hex(&bytes, "memory read"))
        }
        Capability::Unsupported => Outcome::empty(),
    }
}

fn handle_breakpoint<T: Target + ?Sized>(bp: Breakpoint, target: &mut T, insert: bool) -> Outcome {
    match bp {
        Breakpoint::Software(address) => {
            if insert {
                target.set_breakpoint(address);
            } else {
                target.clear_breakpoint(address);
            }
            Outcome::reply("OK")
        }
        Breakpoint::Unsupported => Outcome::empty(),
    }
}

fn bounded_hex(bytes: &[u8], what: &str) -> String {
    let (text, truncated) = hex_encode_bounded(bytes, MAX_REPLY_LEN);
    if truncated {
        warn!(
            "Truncated {} reply from {} to {} bytes",
            what,
            bytes.len(),
            MAX_REPLY_LEN / 2
        );
    }
    text
}

/// One chunk of a `qXfer` read: `m<data>` if more follows, `l<data>` if this
/// is the last piece.
fn xfer_reply(document: Option<&str>, range: XferRange) -> Outcome {
    let Some(document) = document else {
        return Outcome::empty();
    };
    let data = document.as_bytes();
    // A zero-length read can never make progress, so end the transfer.
    if range.offset >= data.len() || range.length == 0 {
        return Outcome::reply("l");
    }
    // Every byte may double once escaped, and one byte goes to the prefix.
    let length = range.length.min((MAX_REPLY_LEN - 1) / 2);
    let end = data.len().min(range.offset + length);
    let mut reply = vec![if end < data.len() { b'm' } else { b'l' }];
    reply.extend(escape_binary(&data[range.offset..end]));
    Outcome::Reply(reply)
}
