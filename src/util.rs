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

//! # Utilities
//!
//! Convenience functions built on top of the [`Device`] operations, such
//! as reading or writing flash ranges larger than a single transfer.

use std::convert::TryFrom;

use crate::{
    constants::*, ChipVariant, Device, Error, MacSlot, Result, Transport,
};

/// Compute the device baud rate divisor.
///
/// Returns `None` if `baud_rate` is zero, greater than [`BAUD_CLOCK`] or so
/// low that the divisor doesn't fit in a byte.
pub fn baud_divisor(baud_rate: u32) -> Option<u8> {
    if baud_rate == 0 {
        return None;
    }

    match BAUD_CLOCK / baud_rate {
        0 => None,
        divisor => u8::try_from(divisor).ok(),
    }
}

/// Write `data` to the flash starting at `start_address`, in chunks of
/// at most [`MAX_BYTES_PER_TRANSFER`] bytes.
///
/// The flash must be selected and erased beforehand.
///
/// # Errors
///
/// [`Error::AddressOutOfRange`] if the range goes past the end of the
/// address space, nothing is written in this case.
pub fn write_flash_range<T, F>(
    device: &mut Device<T>,
    start_address: u32,
    data: &[u8],
    mut progress: F,
) -> Result<()>
where
    T: Transport,
    F: FnMut(usize),
{
    check_range(start_address, data.len())?;

    log::info!(
        "Writing {} bytes at address {:#X}",
        data.len(),
        start_address
    );

    let mut address = start_address;
    for (index, chunk) in data.chunks(MAX_BYTES_PER_TRANSFER).enumerate() {
        log::trace!(
            "Writing chunk #{} ({} B) at address {:#X}",
            index,
            chunk.len(),
            address
        );

        device.write_flash(address, chunk).map_err(|e| {
            log::error!("Chunk #{} failed at address {:#X}", index, address);
            e
        })?;

        // Wraps to 0 only after the last chunk of a range ending at 4 GiB.
        address = address.wrapping_add(chunk.len() as u32);
        progress(chunk.len());
    }

    Ok(())
}

/// Fill `data` with the flash contents starting at `start_address`.
///
/// # Errors
///
/// [`Error::ShortResponse`] if the device returns less bytes than asked
/// for, [`Error::AddressOutOfRange`] if the range goes past the end of the
/// address space.
pub fn read_flash_range<T, F>(
    device: &mut Device<T>,
    start_address: u32,
    data: &mut [u8],
    mut progress: F,
) -> Result<()>
where
    T: Transport,
    F: FnMut(usize),
{
    check_range(start_address, data.len())?;

    let mut address = start_address;
    for chunk in data.chunks_mut(MAX_BYTES_PER_TRANSFER) {
        let len = chunk.len();
        let n = device.read_flash(address, len as u16, chunk)?;
        if n != len {
            return Err(Error::ShortResponse {
                expected: len,
                found: n,
            });
        }

        address = address.wrapping_add(len as u32);
        progress(len);
    }

    Ok(())
}

fn check_range(start_address: u32, len: usize) -> Result<()> {
    const ADDRESS_SPACE: u64 = 1 << 32;

    if u64::from(start_address) + len as u64 > ADDRESS_SPACE {
        return Err(Error::AddressOutOfRange {
            address: start_address,
            len,
        });
    }

    Ok(())
}

/// Read the MAC address of a chip given by its raw tag.
///
/// Unknown tags are logged and nothing is read, `Ok(None)` is returned.
pub fn read_mac_by_tag<T>(
    device: &mut Device<T>,
    chip: u8,
    slot: MacSlot,
) -> Result<Option<[u8; MAC_LEN]>>
where
    T: Transport,
{
    match ChipVariant::try_from(chip) {
        Ok(chip) => device.read_mac(chip, slot).map(Some),
        Err(tag) => {
            log::warn!("reading mac failed, unknown chip type {}", tag);
            Ok(None)
        }
    }
}

/// Write the MAC address of a chip given by its raw tag.
///
/// Unknown tags are logged and nothing is written.
pub fn write_mac_by_tag<T>(
    device: &mut Device<T>,
    chip: u8,
    mac: &[u8; MAC_LEN],
) -> Result<()>
where
    T: Transport,
{
    match ChipVariant::try_from(chip) {
        Ok(chip) => device.write_mac(chip, mac),
        Err(tag) => {
            log::warn!("writing mac failed, unknown chip type {}", tag);
            Ok(())
        }
    }
}

/// Format a MAC address as `00:15:8D:00:01:02:03:04`.
pub fn format_mac(mac: &[u8; MAC_LEN]) -> String {
    mac.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse a MAC address, the bytes may be separated by `:` or `-`, or not
/// separated at all.
pub fn parse_mac(s: &str) -> Option<[u8; MAC_LEN]> {
    let digits: String =
        s.chars().filter(|c| *c != ':' && *c != '-').collect();
    if digits.len() != MAC_LEN * 2 || !digits.is_ascii() {
        return None;
    }

    let mut mac = [0u8; MAC_LEN];
    for (i, byte) in mac.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()?;
    }

    Some(mac)
}

pub fn status_code_to_str(ret: u8) -> &'static str {
    match ret {
        STATUS_OK => "OK",
        STATUS_NOT_SUPPORTED => "NOT_SUPPORTED",
        STATUS_WRITE_FAIL => "WRITE_FAIL",
        STATUS_INVALID_RESPONSE => "INVALID_RESPONSE",
        STATUS_CRC_ERROR => "CRC_ERROR",
        STATUS_ASSERT_FAIL => "ASSERT_FAIL",
        STATUS_USER_INTERRUPT => "USER_INTERRUPT",
        STATUS_READ_FAIL => "READ_FAIL",
        STATUS_TST_ERROR => "TST_ERROR",
        STATUS_AUTH_ERROR => "AUTH_ERROR",
        STATUS_NO_RESPONSE => "NO_RESPONSE",
        _ => "Unknown",
    }
}
