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

use anyhow::{bail, Context, Result};
use clap::{
    crate_authors, crate_version, App, AppSettings, Arg, ArgMatches,
    SubCommand,
};
use jn_sbl::{
    transport::uart::{BootloaderPins, SerialTransport},
    util, ChipVariant, Device, MacSlot, Transport,
};

mod flash;
mod list;
mod read;

#[cfg(unix)]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";
#[cfg(windows)]
const DEFAULT_PORT: &str = "COM1";

pub type SerialDevice = Device<SerialTransport<serial::SystemPort>>;

fn main() -> Result<()> {
    #[cfg(feature = "pretty-env-logger")]
    pretty_env_logger::init_custom_env("JN_SBL_PROG_LOG");
    #[cfg(not(feature = "pretty-env-logger"))]
    env_logger::init_from_env("JN_SBL_PROG_LOG");

    let args = cli().get_matches_safe()?;

    // Doesn't need a device.
    if let ("list", Some(_)) = args.subcommand() {
        return list::list();
    }

    // Sanity checks first
    if args.is_present("bl-inverted") && !args.is_present("bl-invoke") {
        bail!("--bl-inverted can't be used if --bl-invoke is not specified. See --help for more information");
    }

    if args.is_present("bl-active-high") && !args.is_present("bl-invoke") {
        bail!("--bl-active-high can't be used if --bl-invoke is not specified. See --help for more information");
    }

    let global_args = GlobalArgs {
        port: args.value_of("port").unwrap().to_owned(),
        chip: args.value_of("chip").unwrap().parse()?,
        baudrate: args
            .value_of("baudrate")
            .unwrap()
            .parse::<u32>()
            .context("Invalid baud rate")?,
        target_baudrate: args
            .value_of("target-baudrate")
            .map(str::parse::<u32>)
            .transpose()
            .context("Invalid target baud rate")?,
        timeout: args
            .value_of("timeout")
            .unwrap()
            .parse::<u32>()
            .context("Invalid timeout")?,
        bootloader_invoke: args.is_present("bl-invoke"),
        bootloader_inverted: args.is_present("bl-inverted"),
        bootloader_active_high: args.is_present("bl-active-high"),
    };

    if let Some(target) = global_args.target_baudrate {
        if util::baud_divisor(target).is_none() {
            bail!("Target baud rate {} is not supported by the bootloader", target);
        }
    }

    log::info!("Opening serial port `{}`", global_args.port);
    log::info!("Baudrate: {}", global_args.baudrate);
    let port = serial::open(&global_args.port).with_context(|| {
        format!("Couldn't open serial port `{}`", global_args.port)
    })?;

    let transport = if global_args.bootloader_invoke {
        SerialTransport::with_bootloader_pins(
            port,
            BootloaderPins {
                inverted: global_args.bootloader_inverted,
                program_active_high: global_args.bootloader_active_high,
            },
        )
    } else {
        SerialTransport::new(port)
    };

    let mut device =
        Device::new(transport, global_args.baudrate, global_args.timeout)
            .context("Failed to connect to the bootloader")?;

    let result = run(&args, &global_args, &mut device);
    finish(&mut device, result)
}

/// Everything done once the link is up.
fn run(
    args: &ArgMatches<'_>,
    global_args: &GlobalArgs,
    device: &mut SerialDevice,
) -> Result<()> {
    if let Some(target) = global_args.target_baudrate {
        log::info!("Switching to {} baud", target);
        device
            .change_baudrate(target)
            .context("Couldn't change the device baud rate")?;
        device
            .transport_mut()
            .set_baud_rate(target as usize)
            .context("Couldn't change the port baud rate")?;
    }

    let chip_id = device.read_chip_id().context("Couldn't read chip ID")?;
    log::info!("Chip ID: {:#010X}", chip_id);

    match args.subcommand() {
        ("info", Some(_)) => info(global_args.chip, device)?,
        ("flash", Some(m)) => flash::flash(m, device)?,
        ("read", Some(m)) => read::read(m, device)?,
        ("erase", Some(m)) => erase(m, device)?,
        ("mac", Some(m)) => mac(m, global_args.chip, device)?,
        _ => {
            println!("Error: Sub-command required");
            println!("{}", args.usage());
        }
    }

    Ok(())
}

/// Close the link whatever the outcome of `result`, which takes
/// precedence over a close error.
fn finish<T: Transport>(device: &mut Device<T>, result: Result<()>) -> Result<()> {
    let closed = device.fini().context("Couldn't close the link");
    if let (Err(_), Err(e)) = (&result, &closed) {
        log::warn!("{:#}", e);
    }

    result.and(closed)
}

struct GlobalArgs {
    port: String,
    chip: ChipVariant,
    baudrate: u32,
    target_baudrate: Option<u32>,
    timeout: u32,
    bootloader_invoke: bool,
    bootloader_inverted: bool,
    bootloader_active_high: bool,
}

fn info(chip: ChipVariant, device: &mut SerialDevice) -> Result<()> {
    let chip_id = device.read_chip_id().context("Couldn't read chip ID")?;
    let flash = device.identify_flash().context("Couldn't identify flash")?;

    println!("Chip:    {} (ID {:#010X})", chip, chip_id);
    if flash.is_unknown() {
        println!("Flash:   unsupported");
    } else {
        println!("Flash:   {}", flash);
    }

    for &slot in &[MacSlot::Factory, MacSlot::User] {
        let mac = device
            .read_mac(chip, slot)
            .with_context(|| format!("Couldn't read {:?} MAC address", slot))?;
        println!("MAC ({:?}): {}", slot, util::format_mac(&mac));
    }

    Ok(())
}

fn erase(matches: &ArgMatches<'_>, device: &mut SerialDevice) -> Result<()> {
    device.select_flash().context("Couldn't select flash")?;

    match matches.value_of("sector") {
        Some(sector) => {
            let sector = sector.parse::<u8>().context("Invalid sector number")?;
            log::info!("Erasing sector #{}", sector);
            device
                .erase_flash_sector(sector)
                .with_context(|| format!("Couldn't erase sector #{}", sector))?;
        }
        None => {
            log::info!("Erasing flash");
            device.erase_flash().context("Couldn't erase flash")?;
        }
    }

    Ok(())
}

fn mac(
    matches: &ArgMatches<'_>,
    chip: ChipVariant,
    device: &mut SerialDevice,
) -> Result<()> {
    if let Some(value) = matches.value_of("write") {
        let mac = match util::parse_mac(value) {
            Some(mac) => mac,
            None => bail!("Invalid MAC address `{}`, expected 8 hexadecimal bytes", value),
        };

        log::info!("Writing MAC address {}", util::format_mac(&mac));
        device
            .write_mac(chip, &mac)
            .context("Couldn't write MAC address")?;

        return Ok(());
    }

    let slot: MacSlot = matches.value_of("slot").unwrap().parse()?;
    let mac = device
        .read_mac(chip, slot)
        .context("Couldn't read MAC address")?;
    println!("{}", util::format_mac(&mac));

    Ok(())
}

/// Parse a number, hexadecimal if prefixed with `0x`.
pub fn parse_number(s: &str) -> Result<u32> {
    let n = if let Some(hex) =
        s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };

    n.with_context(|| format!("Invalid number `{}`", s))
}

fn cli() -> App<'static, 'static> {
    let app = App::new("Jennic Serial Bootloader Programmer")
        .usage("jn-sbl-prog [OPTIONS] [SUBCOMMAND] ")
        .setting(AppSettings::ColoredHelp)
        .version(crate_version!())
        .author(crate_authors!())
        .about("Programmer for the Jennic/NXP JN51xx serial bootloader")
        .arg(
            opt("port", "Serial port to use")
                .short("p")
                .required(true)
                .default_value(DEFAULT_PORT)
        )
        .arg(
            opt("chip", "Chip: jn5139, jn5142, jn5148, jn516x")
                .required(true)
                .default_value("jn516x")
        )
        .arg(
            opt("baudrate", "Serial port baudrate, the bootloader starts at 38400")
                .short("b")
                .required(true)
                .default_value("38400")
        )
        .arg(
            opt("target-baudrate", "Switch the link to this baudrate after connecting, e.g. 1000000")
                .takes_value(true)
        )
        .arg(
            opt("timeout", "Read timeout in milliseconds")
                .required(true)
                .default_value("500")
        )
        .arg(
            opt(
                "bl-invoke",
                "Invoke the bootloader by toggling the DTR/RTS pins (on supported boards). By default DTR is connected to the program pin (SPI MISO) and RTS is connected to !RESET. To invert this, use --bl-inverted. The program pin is active low by default, to use an active high polarity use --bl-active-high"
            )
        )
        .arg(
            opt(
                "bl-inverted",
                "Invert the pins when using --bl-invoke flag, this sets DTR to !RESET and RTS to the program pin"
            )
        )
        .arg(
            opt(
                "bl-active-high",
                "Use an active-high level when using --bl-invoke flag"
            )
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Show chip, flash and MAC address information")
                .setting(AppSettings::ColoredHelp)
        )
        .subcommand(
            SubCommand::with_name("flash")
                .about("Flash a binary file")
                .setting(AppSettings::ColoredHelp)
                .arg(
                    Arg::with_name("BIN")
                        .required(true)
                        .takes_value(true)
                        .help("Binary file to flash")
                )
                .arg(
                    opt(
                        "address",
                        "Address in flash where the binary contents will be written"
                    )
                        .short("a")
                        .required(true)
                        .default_value("0x00000000")
                )
                .arg(
                    opt("erase", "Erase the whole flash before writing")
                        .short("e")
                )
                .arg(
                    opt("verify", "Read back and compare the flash contents after writing")
                )
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("Read the flash into a file")
                .setting(AppSettings::ColoredHelp)
                .arg(
                    Arg::with_name("OUT")
                        .required(true)
                        .takes_value(true)
                        .help("Output file")
                )
                .arg(
                    opt("address", "Start address")
                        .short("a")
                        .required(true)
                        .default_value("0x00000000")
                )
                .arg(
                    opt("length", "Number of bytes to read")
                        .short("l")
                        .required(true)
                        .takes_value(true)
                )
        )
        .subcommand(
            SubCommand::with_name("erase")
                .about("Erase the flash")
                .setting(AppSettings::ColoredHelp)
                .arg(
                    opt("sector", "Erase only this sector")
                        .short("s")
                        .takes_value(true)
                )
        )
        .subcommand(
            SubCommand::with_name("mac")
                .about("Read or write the MAC address")
                .setting(AppSettings::ColoredHelp)
                .arg(
                    opt("slot", "MAC address to read: factory, user")
                        .required(true)
                        .default_value("factory")
                )
                .arg(
                    opt("write", "Write this MAC address (user slot), e.g. 00:15:8D:00:01:02:03:04")
                        .short("w")
                        .takes_value(true)
                )
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("List the available serial ports")
                .setting(AppSettings::ColoredHelp)
        );

    // When double clicking the binary the binary will be paused. Useful on
    // windows, since the Console window will be closed inmediately.
    #[cfg(windows)]
    let app = app.setting(AppSettings::WaitOnError);

    app
}

fn opt(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name).long(name).help(help)
}

#[cfg(test)]
mod test {
    use std::io;

    use jn_sbl::Exchange;

    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x00001000").unwrap(), 0x1000);
        assert_eq!(parse_number("0XFF").unwrap(), 0xFF);
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert!(parse_number("0xZZ").is_err());
        assert!(parse_number("-1").is_err());
    }

    #[derive(Default)]
    struct Link {
        closed: bool,
        fail_fini: bool,
    }

    impl Transport for Link {
        fn init(&mut self, _: u32, _: u32) -> io::Result<()> {
            Ok(())
        }

        fn prepare(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn talk(&mut self, _: &Exchange<'_>, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no device"))
        }

        fn fini(&mut self) -> io::Result<()> {
            self.closed = true;
            if self.fail_fini {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_finish_closes_link() {
        let mut device = Device::new(Link::default(), 0, 0).unwrap();
        let result = device
            .read_chip_id()
            .map(|_| ())
            .context("Couldn't read chip ID");

        let err = finish(&mut device, result).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't read chip ID");
        assert!(device.transport().closed);

        let mut device = Device::new(Link::default(), 0, 0).unwrap();
        finish(&mut device, Ok(())).unwrap();
        assert!(device.transport().closed);
    }

    #[test]
    fn test_finish_close_error() {
        let link = Link {
            fail_fini: true,
            ..Link::default()
        };
        let mut device = Device::new(link, 0, 0).unwrap();
        let err = finish(&mut device, Ok(())).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't close the link");

        let err = finish(&mut device, Err(anyhow::anyhow!("flash failed")))
            .unwrap_err();
        assert_eq!(err.to_string(), "flash failed");
    }

    #[test]
    fn test_cli() {
        let args = cli()
            .get_matches_from_safe(vec!["jn-sbl-prog", "--chip", "jn5148", "mac", "--slot", "user"])
            .unwrap();
        assert_eq!(args.value_of("chip"), Some("jn5148"));
        assert_eq!(args.value_of("baudrate"), Some("38400"));

        match args.subcommand() {
            ("mac", Some(m)) => assert_eq!(m.value_of("slot"), Some("user")),
            _ => panic!("expected mac subcommand"),
        }
    }
}
