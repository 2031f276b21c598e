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

/// Typed view of an inbound packet body. Parsing never fails: anything that
/// does not match a known form comes back as `Command::Unknown`.
use crate::utils::{parse_hex_u32, parse_hex_usize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `c`
    Continue,
    /// `D`
    Detach,
    /// `g`
    ReadRegisters,
    /// `H...`
    SetThread,
    /// `p<n>`; `None` if the register number is not hex.
    ReadRegister(Option<usize>),
    /// `m<addr>,<len>`; `None` if malformed.
    ReadMemory(Option<MemoryRange>),
    /// `q...`
    Query(Query),
    /// `s`
    Step,
    /// `v...`
    MultiLetter,
    /// `Z...`
    InsertBreakpoint(Breakpoint),
    /// `z...`
    RemoveBreakpoint(Breakpoint),
    /// `?`
    StopReason,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub address: u32,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    /// `0,<addr>[,<kind>]`
    Software(u32),
    /// Any other breakpoint type, or an address that does not parse.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Supported,
    CurrentThread,
    Attached,
    TraceStatus,
    /// `qTfP`, `qTfV`, `qTsP`
    Tracepoints,
    ThreadInfoFirst,
    /// `qXfer:features:read:<annex>:<offset>,<length>`
    ReadFeatures(XferRange),
    /// `qXfer:memory-map:read::<offset>,<length>`
    ReadMemoryMap(XferRange),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XferRange {
    pub offset: usize,
    pub length: usize,
}

impl Command {
    pub fn parse(body: &[u8]) -> Command {
        let Ok(text) = std::str::from_utf8(body) else {
            return Command::Unknown;
        };
        let mut chars = text.chars();
        let Some(first) = chars.next() else {
            return Command::Unknown;
        };
        let rest = chars.as_str();

        match first {
            'c' => Command::Continue,
            'D' => Command::Detach,
            'g' => Command::ReadRegisters,
            'H' => Command::SetThread,
            'p' => Command::ReadRegister(parse_hex_usize(rest)),
            'm' => Command::ReadMemory(parse_memory_range(rest)),
            'q' => Command::Query(Query::parse(text)),
            's' => Command::Step,
            'v' => Command::MultiLetter,
            'Z' => Command::InsertBreakpoint(parse_breakpoint(rest)),
            'z' => Command::RemoveBreakpoint(parse_breakpoint(rest)),
            '?' => Command::StopReason,
            _ => Command::Unknown,
        }
    }
}

impl Query {
    /// `text` is the whole body including the leading `q`. The checks run in
    /// a fixed order: `qC` matches on its second character alone.
    fn parse(text: &str) -> Query {
        if text.starts_with("qSupported") {
            Query::Supported
        } else if text[1..].starts_with('C') {
            Query::CurrentThread
        } else if text.starts_with("qAttached") {
            Query::Attached
        } else if text.starts_with("qTStatus") {
            Query::TraceStatus
        } else if text.starts_with("qTfP") || text.starts_with("qTfV") || text.starts_with("qTsP") {
            Query::Tracepoints
        } else if text.starts_with("qfThreadInfo") {
            Query::ThreadInfoFirst
        } else if let Some(rest) = text.strip_prefix("qXfer:features:read:") {
            // Only one annex is ever served.
            match rest.split_once(':') {
                Some(("target.xml", range)) => parse_xfer_range(range)
                    .map(Query::ReadFeatures)
                    .unwrap_or(Query::Unknown),
                _ => Query::Unknown,
            }
        } else if let Some(range) = text.strip_prefix("qXfer:memory-map:read::") {
            parse_xfer_range(range)
                .map(Query::ReadMemoryMap)
                .unwrap_or(Query::Unknown)
        } else {
            Query::Unknown
        }
    }
}

fn parse_memory_range(input: &str) -> Option<MemoryRange> {
    let (addr, len) = input.split_once(',')?;
    Some(MemoryRange {
        address: parse_hex_u32(addr)?,
        length: parse_hex_usize(len)?,
    })
}

fn parse_xfer_range(input: &str) -> Option<XferRange> {
    let (offset, length) = input.split_once(',')?;
    Some(XferRange {
        offset: parse_hex_usize(offset)?,
        length: parse_hex_usize(length)?,
    })
}

fn parse_breakpoint(input: &str) -> Breakpoint {
    let Some(("0", rest)) = input.split_once(',') else {
        return Breakpoint::Unsupported;
    };
    // The trailing ",<kind>" is optional and not used.
    let addr = rest.split(',').next().unwrap_or(rest);
    match parse_hex_u32(addr) {
        Some(address) => Breakpoint::Software(address),
        None => Breakpoint::Unsupported,
    }
}
