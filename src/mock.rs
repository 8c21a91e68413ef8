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

//! Transports used by the tests.

use std::{
    collections::{BTreeMap, VecDeque},
    io,
};

use crate::{constants::*, Command, Exchange, Transport};

/// An [`Exchange`] as seen by the transport.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RecordedExchange {
    pub command: Command,
    pub address: Option<u32>,
    pub length: Option<u16>,
    pub payload: Vec<u8>,
}

impl<'a> From<&Exchange<'a>> for RecordedExchange {
    fn from(exchange: &Exchange<'a>) -> Self {
        RecordedExchange {
            command: exchange.command,
            address: exchange.address,
            length: exchange.length,
            payload: exchange.payload.to_vec(),
        }
    }
}

fn fill(response: &mut [u8], bytes: &[u8]) -> io::Result<usize> {
    if bytes.len() > response.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "response too big",
        ));
    }

    response[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

/// Replays scripted responses, in order.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub exchanges: Vec<RecordedExchange>,
    /// Size of the response buffer handed to each exchange.
    pub capacities: Vec<usize>,
    responses: VecDeque<io::Result<Vec<u8>>>,
    pub init_params: Option<(u32, u32)>,
    pub fail_init: bool,
    pub fail_prepare: bool,
    pub prepared: bool,
    pub closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response payload, status byte included.
    pub fn respond<B: Into<Vec<u8>>>(&mut self, payload: B) {
        self.responses.push_back(Ok(payload.into()));
    }

    /// Queue a failed exchange.
    pub fn fail(&mut self, kind: io::ErrorKind) {
        self.responses
            .push_back(Err(io::Error::new(kind, "exchange failed")));
    }
}

impl Transport for MockTransport {
    fn init(&mut self, param0: u32, param1: u32) -> io::Result<()> {
        if self.fail_init {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no link"));
        }

        self.init_params = Some((param0, param1));
        Ok(())
    }

    fn prepare(&mut self) -> io::Result<()> {
        if self.fail_prepare {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no device"));
        }

        self.prepared = true;
        Ok(())
    }

    fn talk(
        &mut self,
        exchange: &Exchange<'_>,
        response: &mut [u8],
    ) -> io::Result<usize> {
        self.exchanges.push(exchange.into());
        self.capacities.push(response.len());

        match self.responses.pop_front() {
            Some(Ok(bytes)) => fill(response, &bytes),
            Some(Err(e)) => Err(e),
            None => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no response scripted",
            )),
        }
    }

    fn fini(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// A bootloader with an ST M25P10-A flash attached.
#[derive(Debug)]
pub struct SimulatedDevice {
    pub exchanges: Vec<RecordedExchange>,
    pub flash: Vec<u8>,
    pub ram: BTreeMap<u32, u8>,
    pub selected: Option<u8>,
    pub divisor: Option<u8>,
    pub status_register: u8,
    /// Number of flash program requests.
    pub writes: usize,
}

impl SimulatedDevice {
    pub const FLASH_SIZE: usize = 128 * 1024;
    pub const SECTOR_SIZE: usize = 32 * 1024;
    pub const CHIP_ID: u32 = 0x1000_8686;

    pub fn new() -> Self {
        SimulatedDevice {
            exchanges: Vec::new(),
            // Not erased.
            flash: vec![0x00; Self::FLASH_SIZE],
            ram: BTreeMap::new(),
            selected: None,
            divisor: None,
            status_register: 0x00,
            writes: 0,
        }
    }

    fn flash_range(&self, address: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = address as usize;
        let end = start.checked_add(len)?;
        if end > self.flash.len() {
            return None;
        }

        Some(start..end)
    }

    fn handle(&mut self, exchange: &Exchange<'_>) -> Vec<u8> {
        let address = exchange.address.unwrap_or(0);
        let payload = exchange.payload;

        match exchange.command {
            Command::FlashReadId => vec![STATUS_OK, 0x10, 0x10],
            Command::FlashSelectType => {
                self.selected = payload.first().copied();
                vec![STATUS_OK]
            }
            Command::FlashErase => {
                if self.status_register & 0x1C != 0 {
                    // Block protection still set.
                    return vec![STATUS_WRITE_FAIL];
                }
                let range = match payload.first() {
                    Some(&sector) => {
                        let start = usize::from(sector) * Self::SECTOR_SIZE;
                        if start >= self.flash.len() {
                            return vec![STATUS_INVALID_RESPONSE];
                        }
                        start..start + Self::SECTOR_SIZE
                    }
                    None => 0..self.flash.len(),
                };
                self.flash[range].iter_mut().for_each(|b| *b = 0xFF);
                vec![STATUS_OK]
            }
            Command::FlashWriteStatusRegister => {
                self.status_register = payload[0];
                vec![STATUS_OK]
            }
            Command::FlashProgram => {
                if self.selected.is_none() {
                    return vec![STATUS_NOT_SUPPORTED];
                }
                let range = match self.flash_range(address, payload.len()) {
                    Some(range) => range,
                    None => return vec![STATUS_WRITE_FAIL],
                };
                self.writes += 1;
                // Programming only clears bits.
                for (cell, byte) in self.flash[range].iter_mut().zip(payload) {
                    *cell &= *byte;
                }
                vec![STATUS_OK]
            }
            Command::FlashRead => {
                let len = usize::from(exchange.length.unwrap_or(0));
                match self.flash_range(address, len) {
                    Some(range) => {
                        let mut response = vec![STATUS_OK];
                        response.extend_from_slice(&self.flash[range]);
                        response
                    }
                    None => vec![STATUS_READ_FAIL],
                }
            }
            Command::RamWrite => {
                for (offset, byte) in payload.iter().enumerate() {
                    self.ram.insert(address + offset as u32, *byte);
                }
                vec![STATUS_OK]
            }
            Command::RamRead => {
                let len = u32::from(exchange.length.unwrap_or(0));
                let mut response = vec![STATUS_OK];
                response.extend(
                    (address..address + len)
                        .map(|a| self.ram.get(&a).copied().unwrap_or(0)),
                );
                response
            }
            Command::RamRun => vec![STATUS_OK],
            Command::SetBaud => {
                self.divisor = payload.first().copied();
                vec![STATUS_OK]
            }
            Command::GetChipId => {
                let mut response = vec![STATUS_OK];
                response.extend_from_slice(&Self::CHIP_ID.to_be_bytes());
                response
            }
        }
    }
}

impl Transport for SimulatedDevice {
    fn init(&mut self, _param0: u32, _param1: u32) -> io::Result<()> {
        Ok(())
    }

    fn prepare(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn talk(
        &mut self,
        exchange: &Exchange<'_>,
        response: &mut [u8],
    ) -> io::Result<usize> {
        self.exchanges.push(exchange.into());
        let bytes = self.handle(exchange);
        fill(response, &bytes)
    }

    fn fini(&mut self) -> io::Result<()> {
        Ok(())
    }
}
