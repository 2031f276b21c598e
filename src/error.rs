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

//! Error types for the stub library.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced by the stub. Only `Bind` and `Config` are fatal; the rest are
/// handled inside `tick` by tearing the session down.
#[derive(Debug, Error)]
pub enum StubError {
    /// Socket creation, bind, listen or socket option failure at startup.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Runtime I/O failure on the client connection.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Outgoing payload does not fit into one framed packet.
    #[error("packet too large: {len} bytes (max {max})")]
    PacketTooLarge { len: usize, max: usize },

    /// Config file unreadable or malformed.
    #[error("config error: {0}")]
    Config(String),
}
