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
use indicatif::{ProgressBar, ProgressStyle};
use jn_sbl::util;

use crate::{parse_number, SerialDevice};

/// Flash subcommand entry point.
pub fn flash(matches: &ArgMatches<'_>, device: &mut SerialDevice) -> Result<()> {
    let opts = FlashOpts::from_matches(matches)?;

    let binary = fs::read(&opts.binary_path).with_context(|| {
        format!(
            "Couldn't read firmware file: `{}`",
            opts.binary_path.display()
        )
    })?;

    log::info!("Binary file: `{}`", opts.binary_path.display());
    log::info!("Binary file size: {} bytes", binary.len());

    if binary.is_empty() {
        bail!("Binary file is empty");
    }

    if u64::from(opts.address) + binary.len() as u64 > 1 << 32 {
        bail!("Binary file doesn't fit at address {:#X}", opts.address);
    }

    let flash = device.select_flash().context("Couldn't select flash")?;
    log::info!("Selected flash: {}", flash);

    if opts.erase {
        log::info!("Erasing flash");
        device.erase_flash().context("Couldn't erase flash")?;
    } else {
        log::warn!("Flash not erased, use --erase if the write fails");
    }

    let bar = progress_bar(binary.len());
    util::write_flash_range(device, opts.address, &binary, |n| {
        bar.inc(n as u64)
    })
    .context("Couldn't flash binary")?;
    bar.finish_and_clear();

    if opts.verify {
        log::info!("Verifying");
        let mut contents = vec![0u8; binary.len()];
        let bar = progress_bar(binary.len());
        util::read_flash_range(device, opts.address, &mut contents, |n| {
            bar.inc(n as u64)
        })
        .context("Couldn't read back flash")?;
        bar.finish_and_clear();

        if let Some(offset) = first_mismatch(&binary, &contents) {
            bail!(
                "Verification failed at address {:#X}",
                opts.address + offset as u32
            );
        }
    }

    log::info!("Done, {} bytes written", binary.len());

    Ok(())
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {bytes}/{total_bytes}")
            .progress_chars("##-"),
    );
    bar
}

struct FlashOpts {
    binary_path: PathBuf,
    address: u32,
    erase: bool,
    verify: bool,
}

impl FlashOpts {
    pub fn from_matches(matches: &ArgMatches<'_>) -> Result<FlashOpts> {
        Ok(FlashOpts {
            binary_path: PathBuf::from(matches.value_of("BIN").unwrap()),
            address: parse_number(matches.value_of("address").unwrap())
                .context("Invalid flash address, e.g.: 0x00000000")?,
            erase: matches.is_present("erase"),
            verify: matches.is_present("verify"),
        })
    }
}

fn first_mismatch(expected: &[u8], found: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(found)
        .position(|(a, b)| a != b)
}
