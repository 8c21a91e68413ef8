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

/// Manufacturer and device ids reported by the flash.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FlashIdentity {
    pub vendor_id: u8,
    pub type_id: u8,
}

impl Display for FlashIdentity {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:02X}:{:02X}", self.vendor_id, self.type_id)
    }
}

/// A flash part known by the bootloader.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FlashDescriptor {
    /// Identifier used by the bootloader to select this part.
    pub internal_id: u8,
    pub vendor: &'static str,
    pub part: &'static str,
}

/// Known flash parts.
///
/// Both Atmel type ids are driven as the same part.
static FLASHES: &[(FlashIdentity, FlashDescriptor)] = &[
    (id(0x10, 0x10), part(0x00, "ST", "M25P10-A")),
    (id(0xBF, 0x49), part(0x01, "SST", "25VF010A")),
    (id(0x1F, 0x60), part(0x02, "Atmel", "25F512")),
    (id(0x1F, 0x65), part(0x02, "Atmel", "25F512")),
    (id(0x12, 0x12), part(0x03, "ST", "M25P40")),
    (id(0x05, 0x05), part(0x04, "ST", "M25P05-A")),
    (id(0x11, 0x11), part(0x05, "ST", "M25P20-A")),
    (id(0xCC, 0xEE), part(0x08, "JN516x", "Inner")),
];

const fn id(vendor_id: u8, type_id: u8) -> FlashIdentity {
    FlashIdentity { vendor_id, type_id }
}

const fn part(
    internal_id: u8,
    vendor: &'static str,
    part: &'static str,
) -> FlashDescriptor {
    FlashDescriptor {
        internal_id,
        vendor,
        part,
    }
}

impl FlashDescriptor {
    /// Reserved id of unsupported parts.
    pub const UNKNOWN_ID: u8 = 0xFF;

    /// Returned for any flash not in the table.
    pub const UNKNOWN: FlashDescriptor =
        part(Self::UNKNOWN_ID, "unknown", "unknown");

    /// Find the descriptor of a flash, first match wins.
    ///
    /// Returns [`FlashDescriptor::UNKNOWN`] if the part isn't known.
    pub fn lookup(identity: FlashIdentity) -> FlashDescriptor {
        FLASHES
            .iter()
            .find(|(key, _)| *key == identity)
            .map(|(_, descriptor)| *descriptor)
            .unwrap_or(Self::UNKNOWN)
    }

    /// Whether this is the unsupported part sentinel.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.internal_id == Self::UNKNOWN_ID
    }

    /// All the known parts, in lookup order.
    pub fn known() -> impl Iterator<Item = (FlashIdentity, FlashDescriptor)> {
        FLASHES.iter().copied()
    }
}

impl Display for FlashDescriptor {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{} {} (id: {:#04X})",
            self.vendor, self.part, self.internal_id
        )
    }
}
