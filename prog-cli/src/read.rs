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

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use jn_sbl::util;

use crate::{flash::progress_bar, parse_number, SerialDevice};

/// Read subcommand entry point.
pub fn read(matches: &ArgMatches<'_>, device: &mut SerialDevice) -> Result<()> {
    let path = PathBuf::from(matches.value_of("OUT").unwrap());
    let address = parse_number(matches.value_of("address").unwrap())
        .context("Invalid start address")?;
    let length = parse_number(matches.value_of("length").unwrap())
        .context("Invalid length")?;

    if length == 0 {
        bail!("Nothing to read");
    }

    if u64::from(address) + u64::from(length) > 1 << 32 {
        bail!("{} bytes at {:#X} go past the end of flash", length, address);
    }

    device.select_flash().context("Couldn't select flash")?;

    log::info!("Reading {} bytes at {:#X}", length, address);
    let mut contents = vec![0u8; length as usize];
    let bar = progress_bar(contents.len());
    util::read_flash_range(device, address, &mut contents, |n| {
        bar.inc(n as u64)
    })
    .context("Couldn't read flash")?;
    bar.finish_and_clear();

    fs::write(&path, &contents)
        .with_context(|| format!("Couldn't write `{}`", path.display()))?;

    Ok(())
}
