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
    convert::TryFrom,
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The JN51xx microcontroller families.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChipVariant {
    /// JN5139 microcontrollers.
    JN5139,
    /// JN5142 microcontrollers.
    JN5142,
    /// JN5148 microcontrollers.
    JN5148,
    /// JN5161, JN5164, JN5168 and JN5169 microcontrollers.
    JN516x,
}

/// Which of the two MAC address locations to use.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MacSlot {
    /// MAC address programmed at the factory.
    Factory,
    /// MAC address programmed by the user, overrides the factory one.
    User,
}

impl ChipVariant {
    /// RAM addresses of the MAC address, indexed by [`MacSlot`].
    ///
    /// Older families share the same location for both slots.
    #[inline]
    pub fn mac_addresses(&self) -> [u32; 2] {
        match *self {
            ChipVariant::JN5139 => [0x00000010, 0x00000010],
            ChipVariant::JN5142 => [0x00000010, 0x00000010],
            ChipVariant::JN5148 => [0x00000010, 0x00000010],
            ChipVariant::JN516x => [0x01001580, 0x01001570],
        }
    }

    /// RAM address of the MAC address at the given `slot`.
    #[inline]
    pub fn mac_address(&self, slot: MacSlot) -> u32 {
        self.mac_addresses()[slot.index()]
    }
}

impl MacSlot {
    #[inline]
    pub fn index(&self) -> usize {
        match *self {
            MacSlot::Factory => 0,
            MacSlot::User => 1,
        }
    }
}

impl TryFrom<u8> for ChipVariant {
    type Error = u8;

    /// Convert a raw chip tag, returns the tag back if it's not known.
    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(ChipVariant::JN5139),
            1 => Ok(ChipVariant::JN5142),
            2 => Ok(ChipVariant::JN5148),
            3 => Ok(ChipVariant::JN516x),
            _ => Err(tag),
        }
    }
}

impl Display for ChipVariant {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let name = match *self {
            ChipVariant::JN5139 => "JN5139",
            ChipVariant::JN5142 => "JN5142",
            ChipVariant::JN5148 => "JN5148",
            ChipVariant::JN516x => "JN516x",
        };

        write!(fmt, "{}", name)
    }
}

#[derive(Debug)]
pub struct ParseChipVariantError;

impl Display for ParseChipVariantError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "invalid value, chip must be one of: `jn5139`, `jn5142`, `jn5148` or `jn516x`")
    }
}

impl Error for ParseChipVariantError {}

impl FromStr for ChipVariant {
    type Err = ParseChipVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jn5139" | "JN5139" => Ok(ChipVariant::JN5139),
            "jn5142" | "JN5142" => Ok(ChipVariant::JN5142),
            "jn5148" | "JN5148" => Ok(ChipVariant::JN5148),
            "jn516x" | "JN516x" | "JN516X" => Ok(ChipVariant::JN516x),
            _ => Err(ParseChipVariantError),
        }
    }
}

#[derive(Debug)]
pub struct ParseMacSlotError;

impl Display for ParseMacSlotError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "invalid value, slot must be one of: `factory` or `user`")
    }
}

impl Error for ParseMacSlotError {}

impl FromStr for MacSlot {
    type Err = ParseMacSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "factory" | "0" => Ok(MacSlot::Factory),
            "user" | "1" => Ok(MacSlot::User),
            _ => Err(ParseMacSlotError),
        }
    }
}
