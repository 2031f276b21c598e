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

use anyhow::Result;
use clap::Parser;

use mcu_gdb_stub::logging::init_logging;
use mcu_gdb_stub::run::{run, StubArgs};

#[derive(Parser, Debug)]
#[command(name = "mcu-gdb-stub", version, about = "GDB remote protocol stub")]
struct Cli {
    #[command(flatten)]
    args: StubArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = init_logging(cli.args.debug)?;
    run(cli.args)
}
