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

//! Serial line transport.
//!
//! Every message on the wire is framed as `[len | type | body | checksum]`,
//! where `len` is the number of bytes following it and `checksum` is
//! the XOR of all the previous bytes of the frame.

use std::{
    fmt,
    io::{self, Read, Write},
    time::Duration,
};

use serial::SerialPort;

use super::{Exchange, Transport};

// [len | type] ... [checksum]
const HDR_LEN: usize = 2;
const MAX_FRAME_LEN: usize = std::u8::MAX as usize;

/// How the DTR/RTS lines are wired to the device.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BootloaderPins {
    /// If `false` DTR is connected to the program pin (SPI MISO) and RTS to
    /// !RESET. If `true` it's the other way around.
    pub inverted: bool,
    /// Whether the program pin is active high, it's active low on most
    /// boards.
    pub program_active_high: bool,
}

/// A [`Transport`] over a serial port.
pub struct SerialTransport<P> {
    port: P,
    pins: Option<BootloaderPins>,
}

impl<P> SerialTransport<P>
where
    P: SerialPort,
{
    /// Use an already opened port, the device is expected to be in
    /// bootloader mode already.
    pub fn new(port: P) -> Self {
        SerialTransport { port, pins: None }
    }

    /// Use an already opened port, the bootloader is invoked on
    /// [`Transport::prepare`] by toggling the DTR/RTS lines.
    pub fn with_bootloader_pins(port: P, pins: BootloaderPins) -> Self {
        SerialTransport {
            port,
            pins: Some(pins),
        }
    }

    /// Change the host baud rate, e.g. after the device switched to a new
    /// one.
    pub fn set_baud_rate(&mut self, baud_rate: usize) -> io::Result<()> {
        log::debug!("Switching host baud rate to {}", baud_rate);
        self.port.reconfigure(&|settings: &mut dyn serial::SerialPortSettings| {
            settings.set_baud_rate(serial::BaudRate::from_speed(baud_rate))
        })?;

        Ok(())
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn write_frame(&mut self, exchange: &Exchange<'_>) -> io::Result<()> {
        let pkt = encode_request(exchange)?;

        log::trace!("sending {}, pkt = {:02X?}", exchange.command, pkt);

        self.port.write_all(pkt.as_slice())?;
        self.port.flush()?;

        Ok(())
    }

    fn read_frame(&mut self, response: &mut [u8]) -> io::Result<(u8, usize)> {
        log::trace!("waiting for response header");
        let mut hdr = [0u8; HDR_LEN];
        self.port.read_exact(&mut hdr)?;
        let (len, msg_type) = (hdr[0] as usize, hdr[1]);
        log::trace!("response header received, len = {}, type = {:#X}", len, msg_type);

        if len < HDR_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid response length {}", len),
            ));
        }

        let payload_len = len - HDR_LEN;
        if payload_len > response.len() {
            // Skip the payload and checksum so the next frame starts clean.
            let mut rest = [0u8; u8::MAX as usize];
            self.port.read_exact(&mut rest[..payload_len + 1])?;

            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "received response is too big, expected at most {}, found {}",
                    response.len(),
                    payload_len,
                ),
            ));
        }

        let payload = &mut response[..payload_len];
        self.port.read_exact(payload)?;

        let mut received = [0u8; 1];
        self.port.read_exact(&mut received)?;

        let expected = checksum(&hdr) ^ checksum(payload);
        if received[0] != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "checksum mismatch, expected {:#04X}, found {:#04X}",
                    expected, received[0]
                ),
            ));
        }

        log::trace!("response payload = {:02X?}", payload);

        Ok((msg_type, payload_len))
    }
}

impl<P> Transport for SerialTransport<P>
where
    P: SerialPort,
{
    /// `param0` is the baud rate, `param1` the read timeout in
    /// milliseconds.
    fn init(&mut self, param0: u32, param1: u32) -> io::Result<()> {
        let mut settings = port_settings();
        settings.baud_rate = serial::BaudRate::from_speed(param0 as usize);

        log::debug!("Configuring port, baud rate {}, timeout {} ms", param0, param1);
        self.port.configure(&settings)?;
        self.port
            .set_timeout(Duration::from_millis(u64::from(param1)))?;

        Ok(())
    }

    fn prepare(&mut self) -> io::Result<()> {
        match self.pins {
            Some(pins) => {
                log::debug!("Invoking bootloader");
                invoke_bootloader(
                    &mut self.port,
                    pins.inverted,
                    pins.program_active_high,
                )?;
            }
            None => {
                log::debug!("Bootloader pins not wired, assuming device is in bootloader mode");
            }
        }

        Ok(())
    }

    fn talk(
        &mut self,
        exchange: &Exchange<'_>,
        response: &mut [u8],
    ) -> io::Result<usize> {
        self.write_frame(exchange)?;

        let (msg_type, len) = self.read_frame(response)?;
        if msg_type != exchange.command.response() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "unexpected response {:#04X} to {}, expected {:#04X}",
                    msg_type,
                    exchange.command,
                    exchange.command.response()
                ),
            ));
        }

        Ok(len)
    }

    fn fini(&mut self) -> io::Result<()> {
        log::debug!("Closing link");
        self.port.flush()
    }
}

impl<P> fmt::Debug for SerialTransport<P>
where
    P: SerialPort,
{
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("SerialTransport")
            .field("port", &())
            .field("pins", &self.pins)
            .finish()
    }
}

/// Build the request frame of an exchange.
///
/// The address and length are sent LSB first.
pub fn encode_request(exchange: &Exchange<'_>) -> io::Result<Vec<u8>> {
    let address_len = exchange.address.map_or(0, |_| 4);
    let length_len = exchange.length.map_or(0, |_| 2);
    let frame_len = HDR_LEN + address_len + length_len + exchange.payload.len();

    if frame_len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("packet too big ({} bytes)", frame_len),
        ));
    }

    let mut pkt = Vec::with_capacity(frame_len + 1);
    pkt.push(frame_len as u8);
    pkt.push(exchange.command.request());
    if let Some(address) = exchange.address {
        pkt.extend_from_slice(&address.to_le_bytes());
    }
    if let Some(length) = exchange.length {
        pkt.extend_from_slice(&length.to_le_bytes());
    }
    pkt.extend_from_slice(exchange.payload);
    pkt.push(checksum(&pkt));

    Ok(pkt)
}

fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Default serial port settings.
///
/// The bootloader always starts at 38400 baud.
pub fn port_settings() -> serial::PortSettings {
    serial::PortSettings {
        baud_rate: serial::BaudRate::Baud38400,
        char_size: serial::CharSize::Bits8,
        parity: serial::Parity::ParityNone,
        stop_bits: serial::StopBits::Stop1,
        flow_control: serial::FlowControl::FlowNone,
    }
}

/// Use the DTR and RTS lines to control the program pin and the !RESET
/// pin. The program pin is held while the device comes out of reset, so
/// it starts into the bootloader.
///
/// # Parameters:
///
/// - `inverted`: if it's `false` (default) DTR is connected to the program
/// pin, RTS connnected to !RESET. If it's `true` it's the other way around.
/// - `program_active_high`: whether the program pin is active high.
pub fn invoke_bootloader<P>(
    port: &mut P,
    inverted: bool,
    program_active_high: bool,
) -> serial::Result<()>
where
    P: SerialPort,
{
    fn set_program_pin<P: SerialPort>(
        port: &mut P,
        inverted: bool,
        level: bool,
    ) -> serial::Result<()> {
        if inverted {
            port.set_rts(level)
        } else {
            port.set_dtr(level)
        }
    }

    fn set_reset_pin<P: SerialPort>(
        port: &mut P,
        inverted: bool,
        level: bool,
    ) -> serial::Result<()> {
        if inverted {
            port.set_dtr(level)
        } else {
            port.set_rts(level)
        }
    }

    // The lines are active low, asserting a line drives the pin low.
    set_program_pin(port, inverted, !program_active_high)?;
    set_reset_pin(port, inverted, false)?;
    set_reset_pin(port, inverted, true)?;
    set_reset_pin(port, inverted, false)?;
    // Keep the program pin asserted until the bootloader sampled it.
    #[cfg(not(test))]
    std::thread::sleep(Duration::from_millis(10));
    set_program_pin(port, inverted, program_active_high)?;

    Ok(())
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::command::Command;

    struct DummySerialPort {
        rx: io::Cursor<Vec<u8>>,
        tx: Vec<u8>,
        rts_state: bool,
        dtr_state: bool,
        baud_rate: Option<serial::BaudRate>,
        timeout: Duration,
    }

    impl DummySerialPort {
        fn new(rx: Vec<u8>) -> Self {
            DummySerialPort {
                rx: io::Cursor::new(rx),
                tx: Vec::new(),
                rts_state: false,
                dtr_state: false,
                baud_rate: None,
                timeout: Duration::from_secs(0),
            }
        }
    }

    impl SerialPort for DummySerialPort {
        fn timeout(&self) -> Duration {
            self.timeout
        }
        fn set_timeout(&mut self, timeout: Duration) -> serial::Result<()> {
            self.timeout = timeout;
            Ok(())
        }
        fn configure(
            &mut self,
            settings: &serial::PortSettings,
        ) -> serial::Result<()> {
            self.baud_rate = Some(settings.baud_rate);
            Ok(())
        }
        fn reconfigure(
            &mut self,
            _setup: &dyn Fn(
                &mut dyn serial::SerialPortSettings,
            ) -> serial::Result<()>,
        ) -> serial::Result<()> {
            unreachable!()
        }
        fn set_rts(&mut self, level: bool) -> serial::Result<()> {
            self.rts_state = level;
            Ok(())
        }
        fn set_dtr(&mut self, level: bool) -> serial::Result<()> {
            self.dtr_state = level;
            Ok(())
        }
        fn read_cts(&mut self) -> serial::Result<bool> {
            unreachable!()
        }
        fn read_dsr(&mut self) -> serial::Result<bool> {
            unreachable!()
        }
        fn read_ri(&mut self) -> serial::Result<bool> {
            unreachable!()
        }
        fn read_cd(&mut self) -> serial::Result<bool> {
            unreachable!()
        }
    }

    impl io::Read for DummySerialPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.rx.read(buf)
        }
    }

    impl io::Write for DummySerialPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(msg_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![(payload.len() + HDR_LEN) as u8, msg_type];
        pkt.extend_from_slice(payload);
        pkt.push(checksum(&pkt));
        pkt
    }

    #[test]
    fn test_encode_ram_write() {
        let exchange = Exchange::new(Command::RamWrite)
            .address(0x0400_0400)
            .payload(&[0x01, 0x02, 0x03]);

        assert_eq!(
            encode_request(&exchange).unwrap(),
            vec![0x09, 0x1D, 0x00, 0x04, 0x00, 0x04, 0x01, 0x02, 0x03, 0x14]
        );
    }

    #[test]
    fn test_encode_flash_read() {
        let exchange = Exchange::new(Command::FlashRead)
            .address(0x0000_0010)
            .length(16);

        assert_eq!(
            encode_request(&exchange).unwrap(),
            vec![0x08, 0x0B, 0x10, 0x00, 0x00, 0x00, 0x10, 0x00, 0x03]
        );
    }

    #[test]
    fn test_encode_too_big() {
        let payload = [0u8; 250];
        let exchange = Exchange::new(Command::FlashProgram)
            .address(0)
            .payload(&payload);

        let err = encode_request(&exchange).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_talk() {
        let port = DummySerialPort::new(frame(0x26, &[0x00, 0xCC, 0xEE]));
        let mut transport = SerialTransport::new(port);

        let mut response = [0u8; 16];
        let n = transport
            .talk(&Exchange::new(Command::FlashReadId), &mut response)
            .unwrap();

        assert_eq!(&response[..n], &[0x00, 0xCC, 0xEE]);
        assert_eq!(transport.into_inner().tx, vec![0x02, 0x25, 0x27]);
    }

    #[test]
    fn test_talk_unexpected_response() {
        let port = DummySerialPort::new(frame(0x28, &[0x00]));
        let mut transport = SerialTransport::new(port);

        let mut response = [0u8; 16];
        let err = transport
            .talk(&Exchange::new(Command::GetChipId), &mut response)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_talk_bad_checksum() {
        let mut rx = frame(0x33, &[0x00, 0xDE, 0xAD, 0xBE, 0xEF]);
        *rx.last_mut().unwrap() ^= 0xFF;
        let mut transport = SerialTransport::new(DummySerialPort::new(rx));

        let mut response = [0u8; 16];
        let err = transport
            .talk(&Exchange::new(Command::GetChipId), &mut response)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_talk_response_too_big() {
        let rx = frame(0x20, &[0u8; 17]);
        let mut transport = SerialTransport::new(DummySerialPort::new(rx));

        let mut response = [0u8; 16];
        assert!(transport
            .talk(
                &Exchange::new(Command::RamRead).address(0).length(16),
                &mut response
            )
            .is_err());
    }

    #[test]
    fn test_talk_after_response_too_big() {
        let mut rx = frame(0x08, &[0u8; 17]);
        rx.extend(frame(0x08, &[0x00]));
        let mut transport = SerialTransport::new(DummySerialPort::new(rx));

        let mut response = [0u8; 16];
        let err = transport
            .talk(&Exchange::new(Command::FlashErase), &mut response)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let n = transport
            .talk(&Exchange::new(Command::FlashErase), &mut response)
            .unwrap();
        assert_eq!(&response[..n], &[0x00]);
    }

    #[test]
    fn test_talk_truncated_response() {
        let mut rx = frame(0x0C, &[0x00, 0x01, 0x02, 0x03]);
        rx.truncate(4);
        let mut transport = SerialTransport::new(DummySerialPort::new(rx));

        let mut response = [0u8; 255];
        let err = transport
            .talk(
                &Exchange::new(Command::FlashRead).address(0).length(3),
                &mut response,
            )
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_init() {
        let mut transport = SerialTransport::new(DummySerialPort::new(vec![]));
        transport.init(115200, 250).unwrap();

        let port = transport.into_inner();
        assert_eq!(port.baud_rate, Some(serial::BaudRate::Baud115200));
        assert_eq!(port.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invoke_bootloader() {
        let mut port = DummySerialPort::new(vec![]);

        // Test that the invoke functionality leaves the pins on their normal level.
        invoke_bootloader(&mut port, false, false).unwrap();
        assert_eq!(port.rts_state, false);
        assert_eq!(port.dtr_state, false);

        port.rts_state = false;
        port.dtr_state = false;

        invoke_bootloader(&mut port, true, false).unwrap();
        assert_eq!(port.rts_state, false);
        assert_eq!(port.dtr_state, false);

        // Active-high program pin.
        port.rts_state = false;
        port.dtr_state = true;

        invoke_bootloader(&mut port, false, true).unwrap();
        assert_eq!(port.rts_state, false);
        assert_eq!(port.dtr_state, true);

        port.rts_state = true;
        port.dtr_state = false;

        invoke_bootloader(&mut port, true, true).unwrap();
        assert_eq!(port.rts_state, true);
        assert_eq!(port.dtr_state, false);
    }

    #[test]
    fn test_prepare_with_pins() {
        let pins = BootloaderPins {
            inverted: false,
            program_active_high: false,
        };
        let mut port = DummySerialPort::new(vec![]);
        port.dtr_state = true;
        let mut transport = SerialTransport::with_bootloader_pins(port, pins);

        transport.prepare().unwrap();
        assert_eq!(transport.port_mut().dtr_state, false);
    }
}
