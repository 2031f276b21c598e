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

//! Command line front end: builds a `StubConfig` from flags and an optional
//! config file, then polls a stub wired to a demo target that only logs.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use log::info;

use crate::config::{read_document, ChecksumPolicy, StubConfig, UnknownCommandReply};
use crate::error::StubError;
use crate::server::GdbStub;
use crate::target::{Capability, Target};

#[derive(Args, Debug, Default)]
pub struct StubArgs {
    /// JSON config file; flags below override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// TCP port to listen on (default 5678, 0 = auto-assign)
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Interface to bind (default 0.0.0.0)
    #[arg(long = "bind")]
    pub bind: Option<IpAddr>,

    /// Target description XML served to gdb
    #[arg(long = "target-xml")]
    pub target_xml: Option<PathBuf>,

    /// Memory map XML served to gdb
    #[arg(long = "memory-map")]
    pub memory_map: Option<PathBuf>,

    /// How to treat packets with a bad checksum
    #[arg(long = "checksum", value_enum)]
    pub checksum: Option<ChecksumPolicy>,

    /// How to answer commands the stub does not implement
    #[arg(long = "unknown-reply", value_enum)]
    pub unknown_reply: Option<UnknownCommandReply>,

    /// Delay between polls, in milliseconds
    #[arg(long = "poll-ms", default_value_t = 10)]
    pub poll_ms: u64,

    /// Exit after the first gdb session ends
    #[arg(long = "once", default_value_t = false)]
    pub once: bool,

    /// Enable debug output
    #[arg(short = 'd', long = "debug", default_value_t = false)]
    pub debug: bool,
}

impl StubArgs {
    pub fn to_config(&self) -> Result<StubConfig, StubError> {
        let mut config = match &self.config {
            Some(path) => StubConfig::from_file(path)?,
            None => StubConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(path) = &self.target_xml {
            config.target_description = Some(read_document(path)?);
        }
        if let Some(path) = &self.memory_map {
            config.memory_map = Some(read_document(path)?);
        }
        if let Some(policy) = self.checksum {
            config.checksum_policy = policy;
        }
        if let Some(reply) = self.unknown_reply {
            config.unknown_command_reply = reply;
        }
        Ok(config)
    }
}

/// Stand-in target: logs every request and reports zeroed state.
#[derive(Debug, Default)]
pub struct DemoTarget {
    running: bool,
    breakpoints: BTreeSet<u32>,
}

impl Target for DemoTarget {
    fn connected(&mut self) -> Capability {
        info!("Connected");
        Capability::Done(())
    }

    fn disconnected(&mut self) -> Capability {
        info!("Disconnected");
        self.breakpoints.clear();
        Capability::Done(())
    }

    fn start(&mut self) -> Capability {
        info!("Starting");
        self.running = true;
        Capability::Done(())
    }

    fn stop(&mut self) -> Capability {
        info!("Stopping");
        self.running = false;
        Capability::Done(())
    }

    fn step(&mut self) -> Capability {
        info!("Stepping");
        Capability::Done(())
    }

    fn set_breakpoint(&mut self, address: u32) -> Capability {
        info!("Set breakpoint {:08X}", address);
        self.breakpoints.insert(address);
        Capability::Done(())
    }

    fn clear_breakpoint(&mut self, address: u32) -> Capability {
        info!("Clear breakpoint {:08X}", address);
        self.breakpoints.remove(&address);
        Capability::Done(())
    }

    fn read_memory(&mut self, address: u32, length: usize) -> Capability<Vec<u8>> {
        info!("Getting memory {:08X}, {:08X}", address, length);
        Capability::Done(vec![0; length])
    }

    fn read_register(&mut self, index: usize) -> Capability<Vec<u8>> {
        info!("Getting register value #{}", index);
        Capability::Done(vec![0; 4])
    }

    fn read_registers(&mut self) -> Capability<Vec<u8>> {
        info!("Getting general registers");
        Capability::Done(vec![0; 4])
    }
}

pub fn run(args: StubArgs) -> Result<()> {
    let config = args.to_config().context("invalid configuration")?;
    let addr = config.socket_addr();
    let mut stub = GdbStub::init(config, DemoTarget::default())
        .with_context(|| format!("failed to create gdb stub on {}", addr))?;

    let poll = Duration::from_millis(args.poll_ms);
    let mut had_session = false;
    loop {
        stub.tick();
        if stub.is_connected() {
            had_session = true;
        } else if args.once && had_session {
            break;
        }
        thread::sleep(poll);
    }

    stub.terminate();
    info!("gdb stub stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("stub.json");
        fs::write(
            &cfg_path,
            r#"{"port": 4000, "checksum_policy": "strict", "memory_map": "<memory-map/>"}"#,
        )
        .unwrap();
        let xml_path = dir.path().join("target.xml");
        fs::write(&xml_path, "<target/>").unwrap();

        let args = StubArgs {
            config: Some(cfg_path),
            port: Some(4001),
            target_xml: Some(xml_path),
            unknown_reply: Some(UnknownCommandReply::Empty),
            ..StubArgs::default()
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.port, 4001);
        assert_eq!(config.checksum_policy, ChecksumPolicy::Strict);
        assert_eq!(config.unknown_command_reply, UnknownCommandReply::Empty);
        assert_eq!(config.target_description.as_deref(), Some("<target/>"));
        assert_eq!(config.memory_map.as_deref(), Some("<memory-map/>"));
    }

    #[test]
    fn no_flags_is_default_config() {
        assert_eq!(StubArgs::default().to_config().unwrap(), StubConfig::default());
    }

    #[test]
    fn demo_target_tracks_breakpoints() {
        let mut t = DemoTarget::default();
        t.set_breakpoint(0x1000);
        t.set_breakpoint(0x2000);
        t.clear_breakpoint(0x1000);
        assert_eq!(t.breakpoints.iter().copied().collect::<Vec<_>>(), vec![0x2000]);
        t.start();
        assert!(t.running);
        t.stop();
        assert!(!t.running);
        assert_eq!(t.read_memory(0, 3), Capability::Done(vec![0, 0, 0]));
    }
}
