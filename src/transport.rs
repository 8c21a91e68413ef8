// Copyright 2021 Locha Mesh Developers <contact@locha.io>
//
// Based on the Jennic/NXP JN51xx serial bootloader protocol as documented
// in JN-AN-1003 (Boot Loader Operation).
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

//! # Transport
//!
//! The link to the bootloader, as seen by [`Device`](crate::Device).

use std::io;

use crate::command::Command;

pub mod uart;

/// A single request to the bootloader.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub command: Command,
    /// Memory address the command operates on.
    pub address: Option<u32>,
    /// Number of bytes to read, only used by read commands.
    pub length: Option<u16>,
    pub payload: &'a [u8],
}

impl<'a> Exchange<'a> {
    /// An exchange without parameters.
    pub fn new(command: Command) -> Self {
        Exchange {
            command,
            address: None,
            length: None,
            payload: &[],
        }
    }

    pub fn address(mut self, address: u32) -> Self {
        self.address = Some(address);
        self
    }

    pub fn length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    pub fn payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = payload;
        self
    }
}

/// The capabilities needed to talk to a bootloader.
pub trait Transport {
    /// Establish the link, the meaning of the parameters is up to the
    /// implementation.
    fn init(&mut self, param0: u32, param1: u32) -> io::Result<()>;

    /// Put the device into bootloader mode.
    fn prepare(&mut self) -> io::Result<()>;

    /// Send the request and wait for the response.
    ///
    /// The response payload, starting with the status byte, is written to
    /// `response` and the number of bytes written is returned.
    ///
    /// # Errors
    ///
    /// Fails if the link fails, or the response message type isn't
    /// [`Command::response`].
    fn talk(
        &mut self,
        exchange: &Exchange<'_>,
        response: &mut [u8],
    ) -> io::Result<usize>;

    /// Tear down the link.
    fn fini(&mut self) -> io::Result<()>;
}

impl<T> Transport for &mut T
where
    T: Transport + ?Sized,
{
    fn init(&mut self, param0: u32, param1: u32) -> io::Result<()> {
        (**self).init(param0, param1)
    }

    fn prepare(&mut self) -> io::Result<()> {
        (**self).prepare()
    }

    fn talk(
        &mut self,
        exchange: &Exchange<'_>,
        response: &mut [u8],
    ) -> io::Result<usize> {
        (**self).talk(exchange, response)
    }

    fn fini(&mut self) -> io::Result<()> {
        (**self).fini()
    }
}
