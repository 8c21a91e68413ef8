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

use std::{
    error,
    fmt::{self, Display, Formatter},
    io,
};

use crate::{flash::FlashIdentity, util::status_code_to_str};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors of the bootloader operations.
#[derive(Debug)]
pub enum Error {
    /// The link couldn't be established.
    LinkInit(io::Error),
    /// The link is up but the device couldn't be put into bootloader mode.
    Prepare(io::Error),
    /// The exchange failed, either on the link or because the device
    /// answered with an unexpected message type.
    Transport(io::Error),
    /// The device reported a non-zero status.
    Device(u8),
    /// The response didn't even contain the status byte.
    EmptyResponse,
    /// The response payload is shorter than what the command defines.
    ShortResponse { expected: usize, found: usize },
    /// The flash isn't supported by the bootloader.
    UnsupportedFlash(FlashIdentity),
    /// The baud rate can't be expressed as a divisor of the device clock.
    InvalidBaudRate(u32),
    /// The payload doesn't fit in a single exchange.
    PayloadTooLarge { len: usize, max: usize },
    /// The memory range goes past the end of the 32-bit address space.
    AddressOutOfRange { address: u32, len: usize },
}

impl Error {
    /// The device status code, if the device reported the failure.
    pub fn status(&self) -> Option<u8> {
        match *self {
            Error::Device(status) => Some(status),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::LinkInit(e) => write!(fmt, "couldn't open link: {}", e),
            Error::Prepare(e) => {
                write!(fmt, "couldn't enter bootloader mode: {}", e)
            }
            Error::Transport(e) => write!(fmt, "exchange failed: {}", e),
            Error::Device(status) => write!(
                fmt,
                "device error: `{}` ({:#04X})",
                status_code_to_str(*status),
                status
            ),
            Error::EmptyResponse => write!(fmt, "response without status"),
            Error::ShortResponse { expected, found } => write!(
                fmt,
                "response is too small, expected {}, found {}",
                expected, found
            ),
            Error::UnsupportedFlash(identity) => {
                write!(fmt, "unsupported flash type {}", identity)
            }
            Error::InvalidBaudRate(baud) => {
                write!(fmt, "unsupported baud rate {}", baud)
            }
            Error::PayloadTooLarge { len, max } => write!(
                fmt,
                "payload too big, maximum {} bytes, found {}",
                max, len
            ),
            Error::AddressOutOfRange { address, len } => write!(
                fmt,
                "{} bytes at address {:#X} don't fit in the address space",
                len, address
            ),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::LinkInit(e) | Error::Prepare(e) | Error::Transport(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(e)
    }
}
