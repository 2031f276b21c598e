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

//! Stub configuration, supplied once at initialization.
//!
//! A config file is JSON. The two XML documents can be inlined or given as
//! paths relative to the config file:
//!
//! ```json
//! {
//!   "port": 3333,
//!   "target_description_path": "target.xml",
//!   "checksum_policy": "strict"
//! }
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::StubError;

pub const DEFAULT_PORT: u16 = 5678;

/// What to do with a packet whose checksum does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Ack with `+` and dispatch anyway.
    #[default]
    Permissive,
    /// Ack with `-` so the client retransmits, and drop the packet.
    Strict,
}

/// How to answer a command the stub does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCommandReply {
    /// Log it and send nothing.
    #[default]
    Silent,
    /// Log it and send an empty packet, the RSP "not supported" answer.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Opaque target description XML, served through `qXfer:features:read`.
    pub target_description: Option<String>,
    /// Opaque memory map XML, served through `qXfer:memory-map:read`.
    pub memory_map: Option<String>,
    pub checksum_policy: ChecksumPolicy,
    pub unknown_command_reply: UnknownCommandReply,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            target_description: None,
            memory_map: None,
            checksum_policy: ChecksumPolicy::default(),
            unknown_command_reply: UnknownCommandReply::default(),
        }
    }
}

/// On-disk shape of the config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    bind_address: Option<IpAddr>,
    port: Option<u16>,
    target_description: Option<String>,
    target_description_path: Option<PathBuf>,
    memory_map: Option<String>,
    memory_map_path: Option<PathBuf>,
    checksum_policy: Option<ChecksumPolicy>,
    unknown_command_reply: Option<UnknownCommandReply>,
}

impl StubConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, StubError> {
        let text = read_document(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&text, base)
    }

    /// Parse config JSON. Document paths are resolved against `base_dir`.
    pub fn from_json(text: &str, base_dir: &Path) -> Result<Self, StubError> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|e| StubError::Config(e.to_string()))?;

        let target_description = pick_document(
            "target_description",
            file.target_description,
            file.target_description_path,
            base_dir,
        )?;
        let memory_map =
            pick_document("memory_map", file.memory_map, file.memory_map_path, base_dir)?;

        let defaults = Self::default();
        Ok(Self {
            bind_address: file.bind_address.unwrap_or(defaults.bind_address),
            port: file.port.unwrap_or(defaults.port),
            target_description,
            memory_map,
            checksum_policy: file.checksum_policy.unwrap_or_default(),
            unknown_command_reply: file.unknown_command_reply.unwrap_or_default(),
        })
    }
}

/// Read a document from disk. Used for both config files and the CLI.
pub fn read_document(path: &Path) -> Result<String, StubError> {
    fs::read_to_string(path).map_err(|e| StubError::Config(format!("{}: {}", path.display(), e)))
}

fn pick_document(
    name: &str,
    inline: Option<String>,
    path: Option<PathBuf>,
    base_dir: &Path,
) -> Result<Option<String>, StubError> {
    match (inline, path) {
        (Some(_), Some(_)) => Err(StubError::Config(format!(
            "both {} and {}_path given",
            name, name
        ))),
        (Some(doc), None) => Ok(Some(doc)),
        (None, Some(p)) => read_document(&base_dir.join(p)).map(Some),
        (None, None) => Ok(None),
    }
}
