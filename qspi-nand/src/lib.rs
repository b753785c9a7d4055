#![no_std]
// Must be first to share macros across crate
pub(crate) mod fmt;

#[cfg(test)]
extern crate std;

pub mod cmd_blocking;
pub mod command;
mod device;
pub mod error;
pub mod info;
pub mod register;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{DeviceConfig, QspiNandDevice};

/// Size of the user spare area after the main area of a page
pub const SPARE_AREA_SIZE: usize = 64;
/// Size of the ECC parity area after the user spare area
pub const ECC_AREA_SIZE: usize = 64;

/// Core trait that a QSPI NAND flash device must implement.
///
/// Enables use of the [crate::cmd_blocking::QspiNandBlocking] trait.
///
/// At minimum requires the page size generic `N`, [QspiNand::PAGES_PER_BLOCK],
/// [QspiNand::BLOCK_COUNT] and the ID constants.
///
/// Defaults follow the GigaDevice SPI NAND command set. Default command
/// implementations in [crate::cmd_blocking::QspiNandBlocking] can be
/// overriden by changing the COMMAND constants.
pub trait QspiNand<const N: usize> {
    // Device layout
    /// The size of the main area of a page in bytes
    const PAGE_SIZE: u32 = N as u32;
    /// The number of pages in a block
    const PAGES_PER_BLOCK: u32;
    /// The number of blocks in the device
    const BLOCK_COUNT: u32;
    /// The size of a block in bytes
    const BLOCK_SIZE: u32 = Self::PAGE_SIZE * Self::PAGES_PER_BLOCK;
    /// The total capacity of the device in bytes
    const CAPACITY: u32 = Self::PAGE_SIZE * Self::PAGES_PER_BLOCK * Self::BLOCK_COUNT;
    /// Minimum number of bytes the storage peripheral can read
    const READ_SIZE: u32 = 1;
    /// Bytes addressable in the cache: main, spare and ECC parity areas
    const CACHE_SIZE: u32 = Self::PAGE_SIZE + (SPARE_AREA_SIZE + ECC_AREA_SIZE) as u32;

    // Cache offsets
    /// First spare byte, holds the bad block marker
    const BAD_BLOCK_MARKER_OFFSET: u16 = N as u16;
    /// Start of the ECC parity bytes
    const ECC_OFFSET: u16 = (N + SPARE_AREA_SIZE) as u16;

    // Identification
    /// JEDEC manufacturer ID, first byte returned by read ID
    const JEDEC_MANUFACTURER_ID: u8;
    /// Device ID, second byte returned by read ID
    const JEDEC_DEVICE_ID: u8;
    /// Row address of the unique ID page in the OTP region
    const UID_PAGE: u32 = 0x00;
    /// Row address of the parameter page in the OTP region
    const PARAMETER_PAGE: u32 = 0x01;

    // Timing
    /// Status reads before a poll gives up
    const STATUS_POLL_ATTEMPTS: u16 = 256;
    /// `is_ready` checks before a pending data phase is abandoned
    const TRANSFER_POLL_ATTEMPTS: u32 = 1_000_000;
    /// Status values at or above this after a cache read mean uncorrectable data
    const ECC_UNCORRECTABLE_THRESHOLD: u8 = 0x20;
    /// Settle time after the reset command
    const SOFT_RESET_DELAY_MS: u32 = 1;
    /// Settle time after enable power on reset
    const ENABLE_RESET_DELAY_MS: u32 = 1;
    /// Settle time after power on reset
    const POWER_ON_RESET_DELAY_MS: u32 = 2;
    /// Settle time after reading the unique ID page
    const UID_SETTLE_DELAY_MS: u32 = 1;
    /// Settle time after reading the parameter page
    const PARAMETER_PAGE_SETTLE_DELAY_MS: u32 = 2;

    // Commands
    /// The command to reset the flash device
    const RESET_COMMAND: u8 = 0xFF;
    /// Arms power on reset
    const ENABLE_POWER_ON_RESET_COMMAND: u8 = 0x66;
    /// Power on reset, must follow [QspiNand::ENABLE_POWER_ON_RESET_COMMAND]
    const POWER_ON_RESET_COMMAND: u8 = 0x99;
    /// The command to read the JEDEC ID of the flash device
    const JEDEC_COMMAND: u8 = 0x9F;
    /// Command to read a feature/status register
    const GET_FEATURE_COMMAND: u8 = 0x0F;
    /// Command to write a feature register
    const SET_FEATURE_COMMAND: u8 = 0x1F;
    /// Enable writing to the flash device, including erasing
    const WRITE_ENABLE_COMMAND: u8 = 0x06;
    /// Disable writing to the flash device
    const WRITE_DISABLE_COMMAND: u8 = 0x04;
    /// Command to read a page into the device cache
    const PAGE_READ_COMMAND: u8 = 0x13;
    /// Read from cache, 1-1-1
    const READ_CACHE_X1_COMMAND: u8 = 0x03;
    /// Read from cache, 1-1-2
    const READ_CACHE_X2_COMMAND: u8 = 0x3B;
    /// Read from cache, 1-1-4
    const READ_CACHE_X4_COMMAND: u8 = 0x6B;
    /// Read from cache, 1-2-2
    const READ_CACHE_DUAL_IO_COMMAND: u8 = 0xBB;
    /// Read from cache, 1-4-4
    const READ_CACHE_QUAD_IO_COMMAND: u8 = 0xEB;
    /// Read from cache, 1-4-4 DTR
    const READ_CACHE_QUAD_IO_DTR_COMMAND: u8 = 0xEE;
    /// Command to write bytes to the device cache, resetting current values (0xFF)
    const PROGRAM_LOAD_COMMAND: u8 = 0x02;
    /// Quad line variant of [QspiNand::PROGRAM_LOAD_COMMAND]
    const PROGRAM_LOAD_X4_COMMAND: u8 = 0x32;
    /// Command to write bytes to the device cache, without resetting current values
    const PROGRAM_RANDOM_LOAD_COMMAND: u8 = 0x84;
    /// Quad line variant of [QspiNand::PROGRAM_RANDOM_LOAD_COMMAND]
    const PROGRAM_RANDOM_LOAD_X4_COMMAND: u8 = 0xC4;
    /// Command to program the device cache to a page
    const PROGRAM_EXECUTE_COMMAND: u8 = 0x10;
    /// Command to erase a block of flash memory
    const BLOCK_ERASE_COMMAND: u8 = 0xD8;
}

/// Possible ECC status values after performing a read operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ECCStatus {
    /// No errors detected or corrected
    Ok,
    /// Errors detected and corrected
    Corrected,
    /// Errors detected and corrected, at the bit flip report threshold
    Failing,
    /// Errors detcted but not corrected
    Failed,
}

/// Manufacturer and device ID returned by the read ID command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JedecID {
    /// JEDEC manufacturer ID, 0xC8 for GigaDevice
    id: u8,
    /// The device id
    device: u8,
}

impl JedecID {
    pub const fn new(id: u8, device: u8) -> Self {
        JedecID { id, device }
    }

    pub const fn manufacturer(&self) -> u8 {
        self.id
    }

    pub const fn device(&self) -> u8 {
        self.device
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JedecID {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "JedecID(id: {:02X}, device: {:02X})",
            self.id,
            self.device
        );
    }
}
