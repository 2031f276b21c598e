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

/// Value of a single ASCII hex digit, either case.
pub fn hex_digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Parse a bare RSP hex number: digits only, no prefix, sign or whitespace.
pub fn parse_hex_u32(input: &str) -> Option<u32> {
    if !is_hex_digits(input) {
        return None;
    }
    u32::from_str_radix(input, 16).ok()
}

pub fn parse_hex_usize(input: &str) -> Option<usize> {
    if !is_hex_digits(input) {
        return None;
    }
    usize::from_str_radix(input, 16).ok()
}

// `from_str_radix` on its own also takes a leading `+`.
fn is_hex_digits(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hex-encode at most `max_chars / 2` bytes of `data`. Returns the text and
/// whether anything had to be cut off.
pub fn hex_encode_bounded(data: &[u8], max_chars: usize) -> (String, bool) {
    let max_bytes = max_chars / 2;
    if data.len() > max_bytes {
        (hex::encode(&data[..max_bytes]), true)
    } else {
        (hex::encode(data), false)
    }
}

/// Escape bytes that cannot appear raw inside a packet: `$`, `#`, `}` and `*`
/// become `}` followed by the byte XOR 0x20.
pub fn escape_binary(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            b'$' | b'#' | b'}' | b'*' => {
                out.push(b'}');
                out.push(b ^ 0x20);
            }
            _ => out.push(b),
        }
    }
    out
}
