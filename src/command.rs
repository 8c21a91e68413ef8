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

use std::fmt::{self, Display, Formatter};

use crate::constants::*;

/// A bootloader command, a fixed pair of request and response message
/// types.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command {
    /// Erase the whole flash, or a single sector when given one.
    FlashErase,
    /// Program bytes into the flash.
    FlashProgram,
    /// Read bytes from the flash.
    FlashRead,
    /// Write the flash status register.
    FlashWriteStatusRegister,
    /// Write bytes into RAM.
    RamWrite,
    /// Read bytes from RAM.
    RamRead,
    /// Jump to an address in RAM.
    RamRun,
    /// Read the manufacturer and device ids of the flash.
    FlashReadId,
    /// Change the UART baud rate divisor.
    SetBaud,
    /// Select the flash part the bootloader drives.
    FlashSelectType,
    /// Read the chip id.
    GetChipId,
}

impl Command {
    /// Message type of the request.
    #[inline]
    pub fn request(&self) -> u8 {
        match *self {
            Command::FlashErase => CMD_FLASH_ERASE,
            Command::FlashProgram => CMD_FLASH_PROGRAM,
            Command::FlashRead => CMD_FLASH_READ,
            Command::FlashWriteStatusRegister => CMD_FLASH_WRITE_STATUS_REGISTER,
            Command::RamWrite => CMD_RAM_WRITE,
            Command::RamRead => CMD_RAM_READ,
            Command::RamRun => CMD_RAM_RUN,
            Command::FlashReadId => CMD_FLASH_READ_ID,
            Command::SetBaud => CMD_SET_BAUD,
            Command::FlashSelectType => CMD_FLASH_SELECT_TYPE,
            Command::GetChipId => CMD_GET_CHIP_ID,
        }
    }

    /// Message type the device must answer with.
    #[inline]
    pub fn response(&self) -> u8 {
        match *self {
            Command::FlashErase => RSP_FLASH_ERASE,
            Command::FlashProgram => RSP_FLASH_PROGRAM,
            Command::FlashRead => RSP_FLASH_READ,
            Command::FlashWriteStatusRegister => RSP_FLASH_WRITE_STATUS_REGISTER,
            Command::RamWrite => RSP_RAM_WRITE,
            Command::RamRead => RSP_RAM_READ,
            Command::RamRun => RSP_RAM_RUN,
            Command::FlashReadId => RSP_FLASH_READ_ID,
            Command::SetBaud => RSP_SET_BAUD,
            Command::FlashSelectType => RSP_FLASH_SELECT_TYPE,
            Command::GetChipId => RSP_GET_CHIP_ID,
        }
    }

    /// Whether the response carries a memory dump, these use the larger
    /// [`READ_RESPONSE_LEN`] buffer.
    #[inline]
    pub fn is_read(&self) -> bool {
        matches!(*self, Command::FlashRead | Command::RamRead)
    }

    /// Size of the buffer needed to hold the response payload, status
    /// byte included.
    #[inline]
    pub fn response_capacity(&self) -> usize {
        if self.is_read() {
            READ_RESPONSE_LEN
        } else {
            RESPONSE_LEN
        }
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Command::FlashErase => "FLASH_ERASE",
            Command::FlashProgram => "FLASH_PROGRAM",
            Command::FlashRead => "FLASH_READ",
            Command::FlashWriteStatusRegister => "FLASH_WRITE_STATUS_REGISTER",
            Command::RamWrite => "RAM_WRITE",
            Command::RamRead => "RAM_READ",
            Command::RamRun => "RAM_RUN",
            Command::FlashReadId => "FLASH_READ_ID",
            Command::SetBaud => "SET_BAUD",
            Command::FlashSelectType => "FLASH_SELECT_TYPE",
            Command::GetChipId => "GET_CHIP_ID",
        };

        write!(fmt, "{}", name)
    }
}
