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

use anyhow::Result;

/// USB serial bridges found on JN51xx boards and dongles.
const KNOWN_BRIDGES: &[(u16, u16, &str)] = &[
    (0x0403, 0x6001, "FTDI FT232R"),
    (0x0403, 0x6015, "FTDI FT230X"),
    (0x10C4, 0xEA60, "Silicon Labs CP210x"),
];

#[derive(Debug)]
struct PortInfo {
    port: String,
    usb: Option<UsbInfo>,
}

#[derive(Debug)]
struct UsbInfo {
    vid: u16,
    pid: u16,
    product: Option<String>,
}

impl UsbInfo {
    fn bridge(&self) -> Option<&'static str> {
        KNOWN_BRIDGES
            .iter()
            .find(|(vid, pid, _)| *vid == self.vid && *pid == self.pid)
            .map(|(_, _, name)| *name)
    }
}

/// List subcommand entry point.
pub fn list() -> Result<()> {
    let ports = list_all();
    if ports.is_empty() {
        println!("No serial ports found");
    }

    for port in ports {
        match port.usb {
            Some(usb) => {
                let description = usb
                    .product
                    .as_deref()
                    .or_else(|| usb.bridge())
                    .unwrap_or("");
                let known = if usb.bridge().is_some() { " *" } else { "" };
                println!(
                    "- `{}` {:04X}:{:04X} {}{}",
                    port.port, usb.vid, usb.pid, description, known
                );
            }
            None => println!("- `{}`", port.port),
        }
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn list_all() -> Vec<PortInfo> {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    fn read_line<P: AsRef<Path>>(path: P) -> Option<String> {
        fs::read_to_string(path).ok().map(|s| s.trim().to_owned())
    }

    fn read_hex<P: AsRef<Path>>(path: P) -> Option<u16> {
        u16::from_str_radix(&read_line(path)?, 16).ok()
    }

    // Walks up from the tty device to the USB device holding the ids.
    fn usb_info(device: &Path) -> Option<UsbInfo> {
        let mut dir = fs::canonicalize(device).ok()?;
        while dir.pop() {
            if dir.join("idVendor").exists() {
                return Some(UsbInfo {
                    vid: read_hex(dir.join("idVendor"))?,
                    pid: read_hex(dir.join("idProduct"))?,
                    product: read_line(dir.join("product")),
                });
            }
        }

        None
    }

    let mut ports = Vec::new();
    // usb-serial and CDC-ACM ports only.
    for pattern in &["/dev/ttyUSB*", "/dev/ttyACM*"] {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                log::debug!("invalid pattern `{}`: {}", pattern, e);
                continue;
            }
        };

        for path in paths.filter_map(|p| p.ok()) {
            let name = match path.file_name() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            let device = PathBuf::from("/sys/class/tty").join(name).join("device");

            ports.push(PortInfo {
                port: path.display().to_string(),
                usb: usb_info(&device),
            });
        }
    }

    ports
}

#[cfg(not(target_os = "linux"))]
fn list_all() -> Vec<PortInfo> {
    log::warn!("Serial port listing is only supported on Linux");
    Vec::new()
}
