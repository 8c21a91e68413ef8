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

//! # Jennic Serial Bootloader library
//!
//! This is a library to talk to the serial bootloader of the Jennic (now NXP)
//! JN51xx wireless microcontrollers.
//!
//! The bootloader is driven through a [`Transport`], every operation is a
//! single request/response exchange, nothing is retried.
//!
//! # Supported chips
//!
//! - JN5139
//! - JN5142
//! - JN5148
//! - [JN516x](https://www.nxp.com/products/JN5169)
//!
//! # See also
//!
//! - JN-AN-1003, JN51xx Boot Loader Operation.

use std::fmt;

#[rustfmt::skip]
pub mod constants;
pub mod transport;
pub mod util;

mod chip;
mod command;
mod error;
mod flash;
#[cfg(test)]
mod mock;

pub use self::{
    chip::{ChipVariant, MacSlot, ParseChipVariantError, ParseMacSlotError},
    command::Command,
    error::{Error, Result},
    flash::{FlashDescriptor, FlashIdentity},
    transport::{Exchange, Transport},
};

/// A JN51xx device in bootloader mode.
pub struct Device<T> {
    transport: T,
}

impl<T> Device<T>
where
    T: Transport,
{
    /// Create a new `Device` initializing the `transport`.
    ///
    /// The link is established with `param0` and `param1`, whose meaning
    /// is defined by the transport, and then the device is put into
    /// bootloader mode.
    ///
    /// # Errors
    ///
    /// [`Error::LinkInit`] if the link couldn't be established and
    /// [`Error::Prepare`] if the device couldn't enter the bootloader.
    pub fn new(mut transport: T, param0: u32, param1: u32) -> Result<Self> {
        log::debug!("Initializing link");
        transport.init(param0, param1).map_err(Error::LinkInit)?;
        transport.prepare().map_err(Error::Prepare)?;

        Ok(Device { transport })
    }

    /// Tear down the link.
    pub fn fini(&mut self) -> Result<()> {
        self.transport.fini().map_err(Error::Transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Perform the exchange and return the number of payload bytes after
    /// the status byte.
    ///
    /// The transport is handed at most the response capacity of the
    /// command out of `response`.
    fn talk(
        &mut self,
        exchange: &Exchange<'_>,
        response: &mut [u8],
    ) -> Result<usize> {
        let capacity = exchange.command.response_capacity().min(response.len());
        let response = &mut response[..capacity];

        let received = self.transport.talk(exchange, response)?;
        match received.min(response.len()) {
            0 => Err(Error::EmptyResponse),
            n => Ok(n - 1),
        }
    }

    /// Exchange for commands answering only with a status.
    fn command(&mut self, exchange: &Exchange<'_>) -> Result<()> {
        let mut response = [0u8; constants::READ_RESPONSE_LEN];
        self.talk(exchange, &mut response)?;

        check_status(response[0])
    }

    fn write_memory(
        &mut self,
        command: Command,
        address: u32,
        data: &[u8],
    ) -> Result<()> {
        check_payload(data)?;

        log::trace!("{} {} bytes at {:#010X}", command, data.len(), address);
        self.command(&Exchange::new(command).address(address).payload(data))
    }

    fn read_memory(
        &mut self,
        command: Command,
        address: u32,
        len: u16,
        data: &mut [u8],
    ) -> Result<usize> {
        let mut response = [0u8; constants::READ_RESPONSE_LEN];
        let exchange = Exchange::new(command).address(address).length(len);

        log::trace!("{} {} bytes at {:#010X}", command, len, address);
        let received = self.talk(&exchange, &mut response)?;
        check_status(response[0])?;

        // Never more than the caller can hold.
        let n = received.min(data.len());
        data[..n].copy_from_slice(&response[1..=n]);

        Ok(n)
    }

    /// Read the manufacturer and device ids of the flash.
    pub fn read_flash_id(&mut self) -> Result<FlashIdentity> {
        let mut response = [0u8; constants::READ_RESPONSE_LEN];
        let received =
            self.talk(&Exchange::new(Command::FlashReadId), &mut response)?;

        let status = response[0];
        if status != constants::STATUS_OK {
            log::error!("flash status {:#04X}", status);
            return Err(Error::Device(status));
        }

        if received < 2 {
            return Err(Error::ShortResponse {
                expected: 2,
                found: received,
            });
        }

        Ok(FlashIdentity {
            vendor_id: response[1],
            type_id: response[2],
        })
    }

    /// Identify the flash.
    ///
    /// Parts missing from the flash table are returned as
    /// [`FlashDescriptor::UNKNOWN`].
    pub fn identify_flash(&mut self) -> Result<FlashDescriptor> {
        let identity = self.read_flash_id()?;
        let flash = FlashDescriptor::lookup(identity);

        if flash.is_unknown() {
            log::warn!("unknown flash {}", identity);
        }

        log::info!(
            "flash vendor: {}, type: {}, id: {:#04X}",
            flash.vendor,
            flash.part,
            flash.internal_id
        );

        Ok(flash)
    }

    /// Identify the flash and tell the bootloader to use it.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFlash`] if the flash isn't known, in this case
    /// the device isn't asked to select it.
    pub fn select_flash(&mut self) -> Result<FlashDescriptor> {
        let identity = self.read_flash_id()?;
        let flash = FlashDescriptor::lookup(identity);

        if flash.is_unknown() {
            log::error!("select flash type unsupported, ids {}", identity);
            return Err(Error::UnsupportedFlash(identity));
        }

        let payload = [flash.internal_id];
        self.command(&Exchange::new(Command::FlashSelectType).payload(&payload))
            .map_err(|e| {
                log::error!(
                    "could not select detected flash type {:#04X}: {}",
                    flash.internal_id,
                    e
                );
                e
            })?;

        Ok(flash)
    }

    /// Change the device baud rate.
    ///
    /// The host side of the link has to be switched afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBaudRate`] if the rate has no divisor, see
    /// [`util::baud_divisor`]. Nothing is sent in this case.
    pub fn change_baudrate(&mut self, baud_rate: u32) -> Result<()> {
        let divisor = util::baud_divisor(baud_rate)
            .ok_or(Error::InvalidBaudRate(baud_rate))?;

        log::debug!("Setting baud rate {} (divisor {})", baud_rate, divisor);
        let payload = [divisor];
        self.command(&Exchange::new(Command::SetBaud).payload(&payload))
    }

    /// Write `data` into RAM.
    ///
    /// At most [`constants::MAX_BYTES_PER_TRANSFER`] bytes can be written.
    pub fn write_ram(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.write_memory(Command::RamWrite, address, data)
    }

    /// Read `len` bytes of RAM into `data`.
    ///
    /// Returns the number of bytes stored, which is never more than
    /// `data.len()` even if the device sent more.
    pub fn read_ram(
        &mut self,
        address: u32,
        len: u16,
        data: &mut [u8],
    ) -> Result<usize> {
        self.read_memory(Command::RamRead, address, len, data)
    }

    /// Start executing code at `address`.
    pub fn run_ram(&mut self, address: u32) -> Result<()> {
        self.command(&Exchange::new(Command::RamRun).address(address))
    }

    /// Program `data` into the flash. Requires the flash to be selected
    /// and erased.
    ///
    /// At most [`constants::MAX_BYTES_PER_TRANSFER`] bytes can be written,
    /// see [`util::write_flash_range`].
    pub fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.write_memory(Command::FlashProgram, address, data)
    }

    /// Read `len` bytes of flash into `data`.
    ///
    /// Same truncation rules as [`Device::read_ram`].
    pub fn read_flash(
        &mut self,
        address: u32,
        len: u16,
        data: &mut [u8],
    ) -> Result<usize> {
        self.read_memory(Command::FlashRead, address, len, data)
    }

    /// Erase the whole flash.
    pub fn erase_flash(&mut self) -> Result<()> {
        self.command(&Exchange::new(Command::FlashErase))
            .map_err(|e| {
                log::error!("erase flash failed: {}", e);
                e
            })
    }

    /// Erase a single flash sector.
    ///
    /// Same request as [`Device::erase_flash`], with the sector number as
    /// payload.
    pub fn erase_flash_sector(&mut self, sector: u8) -> Result<()> {
        let payload = [sector];
        self.command(&Exchange::new(Command::FlashErase).payload(&payload))
    }

    /// Write the flash status register, e.g. to clear the block protection
    /// bits.
    pub fn write_flash_status_register(&mut self, value: u8) -> Result<()> {
        let payload = [value];
        self.command(
            &Exchange::new(Command::FlashWriteStatusRegister).payload(&payload),
        )
    }

    /// Read chip ID.
    pub fn read_chip_id(&mut self) -> Result<u32> {
        const CHIP_ID_LEN: usize = 4;

        let mut response = [0u8; constants::READ_RESPONSE_LEN];
        let received =
            self.talk(&Exchange::new(Command::GetChipId), &mut response)?;
        check_status(response[0])?;

        if received < CHIP_ID_LEN {
            return Err(Error::ShortResponse {
                expected: CHIP_ID_LEN,
                found: received,
            });
        }

        let mut id = [0u8; CHIP_ID_LEN];
        id.copy_from_slice(&response[1..=CHIP_ID_LEN]);

        Ok(u32::from_be_bytes(id))
    }

    /// Read the MAC address stored at `slot`.
    pub fn read_mac(
        &mut self,
        chip: ChipVariant,
        slot: MacSlot,
    ) -> Result<[u8; constants::MAC_LEN]> {
        let address = chip.mac_address(slot);
        log::debug!("Reading {} {:?} MAC at {:#010X}", chip, slot, address);

        let mut mac = [0u8; constants::MAC_LEN];
        let n = self.read_ram(address, constants::MAC_LEN as u16, &mut mac)?;
        if n != constants::MAC_LEN {
            return Err(Error::ShortResponse {
                expected: constants::MAC_LEN,
                found: n,
            });
        }

        Ok(mac)
    }

    /// Write the MAC address, always stored in the [`MacSlot::User`] slot.
    pub fn write_mac(
        &mut self,
        chip: ChipVariant,
        mac: &[u8; constants::MAC_LEN],
    ) -> Result<()> {
        let address = chip.mac_address(MacSlot::User);
        log::debug!("Writing {} MAC at {:#010X}", chip, address);

        self.write_ram(address, mac)
    }
}

impl<T> fmt::Debug for Device<T>
where
    T: Transport,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Device")
            .field("transport", &())
            .finish()
    }
}

fn check_status(status: u8) -> Result<()> {
    if status == constants::STATUS_OK {
        Ok(())
    } else {
        Err(Error::Device(status))
    }
}

fn check_payload(data: &[u8]) -> Result<()> {
    if data.len() > constants::MAX_BYTES_PER_TRANSFER {
        return Err(Error::PayloadTooLarge {
            len: data.len(),
            max: constants::MAX_BYTES_PER_TRANSFER,
        });
    }

    Ok(())
}
