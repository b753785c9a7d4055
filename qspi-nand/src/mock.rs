//! Fake QSPI NAND for unit tests.
//!
//! Simulates the cache, the page array, the feature registers and the OTP
//! pages well enough for the driver to run whole operations against it,
//! and records every command it receives.
use std::{collections::HashMap, collections::VecDeque, vec, vec::Vec};

use embedded_hal::delay::DelayNs;
use embedded_nand::PageIndex;

use crate::{
    cmd_blocking::QspiNandBlocking,
    command::QspiCommand,
    register::{Features1, Register, Status},
    transport::{QspiTransport, TransferState},
    QspiNand, ECC_AREA_SIZE, SPARE_AREA_SIZE,
};

const PAGE_SIZE: usize = 2048;
const PAGES_PER_BLOCK: u32 = 64;
const CACHE_SIZE: usize = PAGE_SIZE + SPARE_AREA_SIZE + ECC_AREA_SIZE;

/// Part used by the driver tests, same layout as a 2 Gbit GigaDevice
#[derive(Debug, Clone, Copy, Default)]
pub struct TestNand;

impl QspiNand<PAGE_SIZE> for TestNand {
    const PAGES_PER_BLOCK: u32 = PAGES_PER_BLOCK;
    const BLOCK_COUNT: u32 = 2048;
    const JEDEC_MANUFACTURER_ID: u8 = 0xC8;
    const JEDEC_DEVICE_ID: u8 = 0x92;
}

impl<T: QspiTransport> QspiNandBlocking<T, PAGE_SIZE> for TestNand {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// One command seen by the fake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub instruction: u8,
    pub address: Option<u32>,
    pub dummy_cycles: u8,
    pub len: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Registers {
    pub protection: u8,
    pub features1: u8,
    pub features2: u8,
    pub status2: u8,
}

pub struct FakeNand {
    pub calls: Vec<Call>,
    pub registers: Registers,
    pub id: [u8; 2],
    /// Status register 1 values returned before the simulated value
    pub status_script: VecDeque<u8>,
    /// Returned for every status read once the script is empty
    pub stuck_status: Option<u8>,
    /// ECC bits reported in status register 1
    pub ecc_bits: u8,
    /// Feature register 1 bits that never latch when written
    pub stuck_features_clear: u8,
    pub fail_program: bool,
    pub fail_program_at: Option<PageIndex>,
    pub fail_erase: bool,
    pub fail_erase_at: Option<PageIndex>,
    pub fail_transport: bool,
    pub fail_instruction: Option<u8>,
    /// Data phases report pending and need this many `is_ready` calls
    pub pending_polls: Option<u32>,
    /// Flip a bit of the unique ID so its complement check fails
    pub corrupt_uid: bool,
    pending: u32,
    wel: bool,
    e_fail: bool,
    p_fail: bool,
    cache: Vec<u8>,
    pages: HashMap<u32, Vec<u8>>,
    last: Option<QspiCommand>,
}

impl FakeNand {
    pub fn new() -> Self {
        FakeNand {
            calls: Vec::new(),
            registers: Registers {
                protection: 0x38,
                features1: Features1::ECC_EN.bits(),
                features2: 0x00,
                status2: 0x00,
            },
            id: [0xC8, 0x92],
            status_script: VecDeque::new(),
            stuck_status: None,
            ecc_bits: 0,
            stuck_features_clear: 0,
            fail_program: false,
            fail_program_at: None,
            fail_erase: false,
            fail_erase_at: None,
            fail_transport: false,
            fail_instruction: None,
            pending_polls: None,
            corrupt_uid: false,
            pending: 0,
            wel: false,
            e_fail: false,
            p_fail: false,
            cache: vec![0xFF; CACHE_SIZE],
            pages: HashMap::new(),
            last: None,
        }
    }

    pub fn script_status(&mut self, values: &[u8]) {
        self.status_script.extend(values.iter().copied());
    }

    /// Number of status register 1 reads seen so far
    pub fn status_reads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| {
                c.instruction == 0x0F && c.address == Some(Register::Status1.address() as u32)
            })
            .count()
    }

    /// Copy of a page including its spare and ECC areas
    pub fn page(&self, page: PageIndex) -> Vec<u8> {
        self.pages
            .get(&page.as_u32())
            .cloned()
            .unwrap_or_else(|| vec![0xFF; CACHE_SIZE])
    }

    pub fn page_mut(&mut self, page: PageIndex) -> &mut Vec<u8> {
        self.pages
            .entry(page.as_u32())
            .or_insert_with(|| vec![0xFF; CACHE_SIZE])
    }

    /// Factory unique ID page: 16 bytes followed by their complements
    pub fn uid_page(&self) -> Vec<u8> {
        let mut page = vec![0xFF; CACHE_SIZE];
        for i in 0..16 {
            page[i] = (i as u8).wrapping_mul(37).wrapping_add(5);
            page[i + 16] = !page[i];
        }
        if self.corrupt_uid {
            page[3] ^= 0x04;
        }
        page
    }

    /// Parameter page, starts with the ONFI signature
    pub fn parameter_page(&self) -> Vec<u8> {
        let mut page = vec![0x00; CACHE_SIZE];
        page[..4].copy_from_slice(b"ONFI");
        for (i, b) in page.iter_mut().enumerate().take(128).skip(4) {
            *b = i as u8;
        }
        page
    }

    fn status1(&mut self) -> u8 {
        if let Some(value) = self.status_script.pop_front() {
            return value;
        }
        if let Some(value) = self.stuck_status {
            return value;
        }
        let mut status = Status::empty();
        status.set(Status::WEL, self.wel);
        status.set(Status::E_FAIL, self.e_fail);
        status.set(Status::P_FAIL, self.p_fail);
        status.bits() | self.ecc_bits
    }

    fn otp_enabled(&self) -> bool {
        self.registers.features1 & Features1::OTP_EN.bits() != 0
    }

    fn execute(&mut self, cmd: &QspiCommand) {
        let row = cmd.address().map(|a| a.value).unwrap_or(0);
        match cmd.instruction_byte() {
            0x06 => self.wel = true,
            0x04 => self.wel = false,
            0xFF | 0x99 => {
                self.wel = false;
                self.e_fail = false;
                self.p_fail = false;
            }
            0x13 => {
                self.cache = if self.otp_enabled() && row == 0 {
                    self.uid_page()
                } else if self.otp_enabled() && row == 1 {
                    self.parameter_page()
                } else {
                    self.page(PageIndex::new(row))
                };
            }
            0x10 => {
                let fail =
                    self.fail_program || self.fail_program_at == Some(PageIndex::new(row));
                self.p_fail = fail;
                if !fail && self.wel {
                    let cache = self.cache.clone();
                    let page = self.page_mut(PageIndex::new(row));
                    for (p, c) in page.iter_mut().zip(cache) {
                        *p &= c;
                    }
                }
                self.wel = false;
            }
            0xD8 => {
                let fail = self.fail_erase || self.fail_erase_at == Some(PageIndex::new(row));
                self.e_fail = fail;
                if !fail && self.wel {
                    let first = row - row % PAGES_PER_BLOCK;
                    for page in first..first + PAGES_PER_BLOCK {
                        self.pages.remove(&page);
                    }
                }
                self.wel = false;
            }
            _ => {}
        }
    }

    fn start_transfer(&mut self) -> TransferState {
        match self.pending_polls {
            Some(polls) => {
                self.pending = polls;
                TransferState::Pending
            }
            None => TransferState::Complete,
        }
    }
}

impl Default for FakeNand {
    fn default() -> Self {
        Self::new()
    }
}

impl QspiTransport for FakeNand {
    type Error = MockError;

    fn command(&mut self, cmd: &QspiCommand) -> Result<(), Self::Error> {
        self.calls.push(Call {
            instruction: cmd.instruction_byte(),
            address: cmd.address().map(|a| a.value),
            dummy_cycles: cmd.dummy_cycles(),
            len: cmd.data().map(|d| d.len).unwrap_or(0),
        });
        if self.fail_transport || self.fail_instruction == Some(cmd.instruction_byte()) {
            return Err(MockError);
        }
        self.last = Some(*cmd);
        if cmd.data().is_none() {
            self.execute(cmd);
        }
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<TransferState, Self::Error> {
        let cmd = self.last.take().ok_or(MockError)?;
        let data = cmd.data().ok_or(MockError)?;
        assert_eq!(data.len, buf.len());
        let column = cmd.address().map(|a| a.value as usize).unwrap_or(0);
        match cmd.instruction_byte() {
            0x0F => {
                buf[0] = match column as u8 {
                    0xA0 => self.registers.protection,
                    0xB0 => self.registers.features1,
                    0xC0 => self.status1(),
                    0xD0 => self.registers.features2,
                    0xF0 => self.registers.status2,
                    _ => 0x00,
                }
            }
            0x9F => buf.copy_from_slice(&self.id[..buf.len()]),
            0x03 | 0x3B | 0x6B | 0xBB | 0xEB | 0xEE => {
                buf.copy_from_slice(&self.cache[column..column + buf.len()])
            }
            _ => return Err(MockError),
        }
        Ok(self.start_transfer())
    }

    fn transmit(&mut self, buf: &[u8]) -> Result<TransferState, Self::Error> {
        let cmd = self.last.take().ok_or(MockError)?;
        let data = cmd.data().ok_or(MockError)?;
        assert_eq!(data.len, buf.len());
        let column = cmd.address().map(|a| a.value as usize).unwrap_or(0);
        match cmd.instruction_byte() {
            0x1F => match column as u8 {
                0xA0 => self.registers.protection = buf[0],
                0xB0 => self.registers.features1 = buf[0] & !self.stuck_features_clear,
                0xD0 => self.registers.features2 = buf[0],
                _ => return Err(MockError),
            },
            0x02 | 0x32 => {
                self.cache.fill(0xFF);
                self.cache[column..column + buf.len()].copy_from_slice(buf);
            }
            0x84 | 0xC4 => self.cache[column..column + buf.len()].copy_from_slice(buf),
            _ => return Err(MockError),
        }
        Ok(self.start_transfer())
    }

    fn is_ready(&mut self) -> Result<bool, Self::Error> {
        if self.pending == 0 {
            return Ok(true);
        }
        self.pending -= 1;
        Ok(false)
    }
}

/// Delay that returns straight away
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that records the requested milliseconds
#[derive(Default)]
pub struct RecordingDelay {
    pub ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.ms.push(ms);
    }
}
