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

//! The contract a debug target has to fulfil to be driven by the stub.
//!
//! Every method has a default that reports `Capability::Unsupported`, so an
//! embedder only overrides what the target can actually do. The dispatcher
//! turns an unsupported capability into a neutral reply, never an error.

/// Outcome of a single capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability<T = ()> {
    Done(T),
    Unsupported,
}

impl<T> Capability<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Done(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Capability::Done(v) => Some(v),
            Capability::Unsupported => None,
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Capability::Done(v),
            None => Capability::Unsupported,
        }
    }
}

pub trait Target {
    /// A debugger client connected.
    fn connected(&mut self) -> Capability {
        Capability::Unsupported
    }

    /// The client session ended (detach, peer close, I/O error or shutdown).
    fn disconnected(&mut self) -> Capability {
        Capability::Unsupported
    }

    /// Resume execution (`c`).
    fn start(&mut self) -> Capability {
        Capability::Unsupported
    }

    /// Halt execution (`?` and interrupts).
    fn stop(&mut self) -> Capability {
        Capability::Unsupported
    }

    /// Execute one instruction (`s`).
    fn step(&mut self) -> Capability {
        Capability::Unsupported
    }

    fn set_breakpoint(&mut self, _address: u32) -> Capability {
        Capability::Unsupported
    }

    fn clear_breakpoint(&mut self, _address: u32) -> Capability {
        Capability::Unsupported
    }

    /// Read up to `length` bytes starting at `address`. Returning fewer bytes
    /// than asked for is allowed.
    fn read_memory(&mut self, _address: u32, _length: usize) -> Capability<Vec<u8>> {
        Capability::Unsupported
    }

    /// Raw target-endian bytes of one register (`p`).
    fn read_register(&mut self, _index: usize) -> Capability<Vec<u8>> {
        Capability::Unsupported
    }

    /// Raw target-endian bytes of the general register file, in the order GDB
    /// expects for the architecture (`g`).
    fn read_registers(&mut self) -> Capability<Vec<u8>> {
        Capability::Unsupported
    }
}

impl<T: Target + ?Sized> Target for &mut T {
    fn connected(&mut self) -> Capability {
        (**self).connected()
    }
    fn disconnected(&mut self) -> Capability {
        (**self).disconnected()
    }
    fn start(&mut self) -> Capability {
        (**self).start()
    }
    fn stop(&mut self) -> Capability {
        (**self).stop()
    }
    fn step(&mut self) -> Capability {
        (**self).step()
    }
    fn set_breakpoint(&mut self, address: u32) -> Capability {
        (**self).set_breakpoint(address)
    }
    fn clear_breakpoint(&mut self, address: u32) -> Capability {
        (**self).clear_breakpoint(address)
    }
    fn read_memory(&mut self, address: u32, length: usize) -> Capability<Vec<u8>> {
        (**self).read_memory(address, length)
    }
    fn read_register(&mut self, index: usize) -> Capability<Vec<u8>> {
        (**self).read_register(index)
    }
    fn read_registers(&mut self) -> Capability<Vec<u8>> {
        (**self).read_registers()
    }
}

/// A target with no capabilities at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTarget;

impl Target for NullTarget {}
