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

// Crate root: declare modules and control visibility
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod logging;
pub mod packet;
pub mod run;
pub mod server;
pub mod target;
pub mod transport;
pub mod utils;

// Re-export commonly used API from the library for binaries/tests
pub use config::{ChecksumPolicy, StubConfig, UnknownCommandReply};
pub use error::StubError;
pub use server::GdbStub;
pub use target::{Capability, NullTarget, Target};
