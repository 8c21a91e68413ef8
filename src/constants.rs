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

/// Request to erase the whole flash.
pub const CMD_FLASH_ERASE: u8                   = 0x07;
pub const RSP_FLASH_ERASE: u8                   = 0x08;
pub const CMD_FLASH_PROGRAM: u8                 = 0x09;
pub const RSP_FLASH_PROGRAM: u8                 = 0x0A;
pub const CMD_FLASH_READ: u8                    = 0x0B;
pub const RSP_FLASH_READ: u8                    = 0x0C;
pub const CMD_FLASH_WRITE_STATUS_REGISTER: u8   = 0x0F;
pub const RSP_FLASH_WRITE_STATUS_REGISTER: u8   = 0x10;
pub const CMD_RAM_WRITE: u8                     = 0x1D;
pub const RSP_RAM_WRITE: u8                     = 0x1E;
pub const CMD_RAM_READ: u8                      = 0x1F;
pub const RSP_RAM_READ: u8                      = 0x20;
pub const CMD_RAM_RUN: u8                       = 0x21;
pub const RSP_RAM_RUN: u8                       = 0x22;
pub const CMD_FLASH_READ_ID: u8                 = 0x25;
pub const RSP_FLASH_READ_ID: u8                 = 0x26;
pub const CMD_SET_BAUD: u8                      = 0x27;
pub const RSP_SET_BAUD: u8                      = 0x28;
pub const CMD_FLASH_SELECT_TYPE: u8             = 0x2C;
pub const RSP_FLASH_SELECT_TYPE: u8             = 0x2D;
pub const CMD_GET_CHIP_ID: u8                   = 0x32;
pub const RSP_GET_CHIP_ID: u8                   = 0x33;

/// Maximum bytes per transfer, on RAM and flash write commands.
pub const MAX_BYTES_PER_TRANSFER: usize         = 128;

/// Response buffer size for [`CMD_RAM_READ`] and [`CMD_FLASH_READ`].
pub const READ_RESPONSE_LEN: usize              = 255;
/// Response buffer size for every other command.
pub const RESPONSE_LEN: usize                   = 16;

/// Length of a MAC address stored on the device.
pub const MAC_LEN: usize                        = 8;

/// Reference clock used by the device to derive the baud rate divisor.
pub const BAUD_CLOCK: u32                       = 1_000_000;

pub const STATUS_OK: u8                         = 0x00;
pub const STATUS_NOT_SUPPORTED: u8              = 0xFF;
pub const STATUS_WRITE_FAIL: u8                 = 0xFE;
pub const STATUS_INVALID_RESPONSE: u8           = 0xFD;
pub const STATUS_CRC_ERROR: u8                  = 0xFC;
pub const STATUS_ASSERT_FAIL: u8                = 0xFB;
pub const STATUS_USER_INTERRUPT: u8             = 0xFA;
pub const STATUS_READ_FAIL: u8                  = 0xF9;
pub const STATUS_TST_ERROR: u8                  = 0xF8;
pub const STATUS_AUTH_ERROR: u8                 = 0xF7;
pub const STATUS_NO_RESPONSE: u8                = 0xF6;
