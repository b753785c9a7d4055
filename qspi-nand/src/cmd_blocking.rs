use embedded_hal::delay::DelayNs;
use embedded_nand::{iter::PageIter, BlockIndex, ColumnAddress, PageIndex};
use utils::{receive, send, transmit};

use crate::{
    command::{ProgramMode, QspiCommand, ReadMode},
    error::QspiNandError,
    register::{Features1, PollStep, Register, Status, StatusCheck},
    transport::QspiTransport,
    ECCStatus, JedecID, QspiNand, ECC_AREA_SIZE, SPARE_AREA_SIZE,
};

/// Blocking QSPI NAND flash trait.
/// Contains the low level, single transaction commands.
///
/// Compound functions are provided for status polling, register
/// read-modify-write, page reads with ECC reporting, page programs
/// and block erases including the required write enable, waiting and
/// checking for errors, and internal page/block moves.
///
/// The default implementations follow the GigaDevice SPI NAND command set.
/// Look to make changes to the [QspiNand] trait first to change the default behavior.
/// If this isn't possible, override the default function(s).
///
/// The transport is passed to every call and no state is kept between calls.
pub trait QspiNandBlocking<T: QspiTransport, const N: usize>: QspiNand<N> {
    // ============= Commands =============

    /// Issue a reset command to the flash device
    fn reset_cmd(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        send(spi, &QspiCommand::instruction(Self::RESET_COMMAND))
    }

    /// Arm power on reset
    fn enable_power_on_reset_cmd(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        send(
            spi,
            &QspiCommand::instruction(Self::ENABLE_POWER_ON_RESET_COMMAND),
        )
    }

    /// Power on reset, ignored unless armed with [QspiNandBlocking::enable_power_on_reset_cmd]
    fn power_on_reset_cmd(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        send(spi, &QspiCommand::instruction(Self::POWER_ON_RESET_COMMAND))
    }

    /// Read the manufacturer and device ID
    fn read_jedec_id_cmd(&self, spi: &mut T) -> Result<JedecID, QspiNandError<T::Error>> {
        let mut buf = [0; 2];
        receive(
            spi,
            &QspiCommand::read_id(Self::JEDEC_COMMAND, buf.len()),
            &mut buf,
            Self::TRANSFER_POLL_ATTEMPTS,
        )?;
        Ok(JedecID::new(buf[0], buf[1]))
    }

    /// Read one feature or status register
    fn get_feature_cmd(
        &self,
        spi: &mut T,
        register: Register,
    ) -> Result<u8, QspiNandError<T::Error>> {
        let mut buf = [0; 1];
        receive(
            spi,
            &QspiCommand::get_feature(Self::GET_FEATURE_COMMAND, register.address()),
            &mut buf,
            Self::TRANSFER_POLL_ATTEMPTS,
        )?;
        Ok(buf[0])
    }

    /// Write one feature register
    fn set_feature_cmd(
        &self,
        spi: &mut T,
        register: Register,
        value: u8,
    ) -> Result<(), QspiNandError<T::Error>> {
        transmit(
            spi,
            &QspiCommand::set_feature(Self::SET_FEATURE_COMMAND, register.address()),
            &[value],
            Self::TRANSFER_POLL_ATTEMPTS,
        )
    }

    /// Enable writing to the flash device
    fn write_enable_cmd(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        send(spi, &QspiCommand::instruction(Self::WRITE_ENABLE_COMMAND))
    }

    /// Disable writing to the flash device
    fn write_disable_cmd(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        send(spi, &QspiCommand::instruction(Self::WRITE_DISABLE_COMMAND))
    }

    /// Read a page into the device cache
    ///
    /// Use [QspiNandBlocking::page_read] to also wait for completion
    fn page_read_cmd(&self, spi: &mut T, page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        trace!("Page read to cache {}", page.as_u32());
        send(spi, &QspiCommand::page_to_cache(Self::PAGE_READ_COMMAND, page))
    }

    /// Read bytes from the device cache starting at `column`
    fn read_cache_cmd(
        &self,
        spi: &mut T,
        mode: ReadMode,
        column: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        let cmd = QspiCommand::read_cache(self.read_cache_opcode(mode), mode, column, buf.len());
        receive(spi, &cmd, buf, Self::TRANSFER_POLL_ATTEMPTS)
    }

    /// Write bytes into the device cache starting at `column`
    ///
    /// Plain loads reset the cache to 0xFF first, random loads keep it.
    ///
    /// Use [QspiNandBlocking::write_enable] to enable writing before this command
    ///
    /// Use [QspiNandBlocking::program_execute_cmd] to write the cache to a page
    fn program_load_cmd(
        &self,
        spi: &mut T,
        mode: ProgramMode,
        column: ColumnAddress,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        let cmd =
            QspiCommand::program_load(self.program_load_opcode(mode), mode, column, buf.len());
        transmit(spi, &cmd, buf, Self::TRANSFER_POLL_ATTEMPTS)
    }

    /// Write the device cache to a page
    ///
    /// Use [QspiNandBlocking::program_execute] to also wait and check for P_FAIL
    fn program_execute_cmd(
        &self,
        spi: &mut T,
        page: PageIndex,
    ) -> Result<(), QspiNandError<T::Error>> {
        trace!("Program execute {}", page.as_u32());
        send(
            spi,
            &QspiCommand::program_execute(Self::PROGRAM_EXECUTE_COMMAND, page),
        )
    }

    /// Erase the block containing `page`
    fn block_erase_cmd(&self, spi: &mut T, page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        send(spi, &QspiCommand::block_erase(Self::BLOCK_ERASE_COMMAND, page))
    }

    /// Opcode of the cache read variant
    fn read_cache_opcode(&self, mode: ReadMode) -> u8 {
        match mode {
            ReadMode::X1 => Self::READ_CACHE_X1_COMMAND,
            ReadMode::X2 => Self::READ_CACHE_X2_COMMAND,
            ReadMode::X4 => Self::READ_CACHE_X4_COMMAND,
            ReadMode::DualIo => Self::READ_CACHE_DUAL_IO_COMMAND,
            ReadMode::QuadIo => Self::READ_CACHE_QUAD_IO_COMMAND,
            ReadMode::QuadIoDtr => Self::READ_CACHE_QUAD_IO_DTR_COMMAND,
        }
    }

    /// Opcode of the program load variant
    fn program_load_opcode(&self, mode: ProgramMode) -> u8 {
        match mode {
            ProgramMode::Load => Self::PROGRAM_LOAD_COMMAND,
            ProgramMode::LoadX4 => Self::PROGRAM_LOAD_X4_COMMAND,
            ProgramMode::RandomLoad => Self::PROGRAM_RANDOM_LOAD_COMMAND,
            ProgramMode::RandomLoadX4 => Self::PROGRAM_RANDOM_LOAD_X4_COMMAND,
        }
    }

    // ============= Status functions ============

    /// Read status register 1
    fn read_status(&self, spi: &mut T) -> Result<Status, QspiNandError<T::Error>> {
        Ok(Status::from_bits_retain(
            self.get_feature_cmd(spi, Register::Status1)?,
        ))
    }

    /// Poll status register 1 until `check` is met.
    ///
    /// Reads the register at most [QspiNand::STATUS_POLL_ATTEMPTS] times with
    /// no delay in between. A fail bit covered by [StatusCheck::NoError]
    /// ends the poll straight away with the matching error, running out of
    /// reads gives [QspiNandError::PollTimeout].
    fn check_status(
        &self,
        spi: &mut T,
        check: StatusCheck,
    ) -> Result<Status, QspiNandError<T::Error>> {
        for _ in 0..Self::STATUS_POLL_ATTEMPTS {
            let status = self.read_status(spi)?;
            match check.step(status) {
                PollStep::Done => return Ok(status),
                PollStep::Pending => {}
                PollStep::Failed => {
                    // Fail bits stay latched, only the polled ones count
                    let hit = match check {
                        StatusCheck::NoError(mask) => status & mask,
                        _ => status,
                    };
                    return Err(if hit.contains(Status::E_FAIL) {
                        QspiNandError::EraseFailed
                    } else if hit.contains(Status::P_FAIL) {
                        QspiNandError::ProgramFailed
                    } else if hit.intersects(Status::ECCS0 | Status::ECCS1) {
                        QspiNandError::EccUncorrectable
                    } else {
                        QspiNandError::Other
                    });
                }
            }
        }
        error!(
            "Status poll timed out after {} reads",
            Self::STATUS_POLL_ATTEMPTS
        );
        Err(QspiNandError::PollTimeout)
    }

    /// Check the ECC flags after a page read
    fn check_ecc(&self, spi: &mut T) -> Result<ECCStatus, QspiNandError<T::Error>> {
        Ok(self.read_status(spi)?.ecc())
    }

    /// Read feature register 1
    fn read_feature_reg(&self, spi: &mut T) -> Result<Features1, QspiNandError<T::Error>> {
        Ok(Features1::from_bits_retain(
            self.get_feature_cmd(spi, Register::Features1)?,
        ))
    }

    /// Set `bits` in feature register 1 and verify they read back set
    fn set_feature_bits(
        &self,
        spi: &mut T,
        bits: Features1,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.update_register(spi, Register::Features1, bits.bits(), true)
    }

    /// Clear `bits` in feature register 1 and verify they read back clear
    fn clear_feature_bits(
        &self,
        spi: &mut T,
        bits: Features1,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.update_register(spi, Register::Features1, bits.bits(), false)
    }

    /// Read-modify-write of a register, then read back to verify
    fn update_register(
        &self,
        spi: &mut T,
        register: Register,
        bits: u8,
        set: bool,
    ) -> Result<(), QspiNandError<T::Error>> {
        let current = self.get_feature_cmd(spi, register)?;
        let value = if set { current | bits } else { current & !bits };
        self.set_feature_cmd(spi, register, value)?;
        let read_back = self.get_feature_cmd(spi, register)?;
        let applied = if set {
            read_back & bits == bits
        } else {
            read_back & bits == 0
        };
        if !applied {
            warn!(
                "Register {:02X} verify failed, wrote {:02X} read {:02X}",
                register.address(),
                value,
                read_back
            );
            return Err(QspiNandError::FeatureVerify {
                register,
                read_back,
            });
        }
        Ok(())
    }

    /// Read the block protection register
    fn get_protection(&self, spi: &mut T) -> Result<u8, QspiNandError<T::Error>> {
        self.get_feature_cmd(spi, Register::Protection)
    }

    /// Write the block protection register and verify it.
    /// 0x00 leaves every block unprotected.
    fn set_protection(&self, spi: &mut T, value: u8) -> Result<(), QspiNandError<T::Error>> {
        self.set_feature_cmd(spi, Register::Protection, value)?;
        let read_back = self.get_feature_cmd(spi, Register::Protection)?;
        if read_back != value {
            warn!(
                "Protection verify failed, wrote {:02X} read {:02X}",
                value, read_back
            );
            return Err(QspiNandError::FeatureVerify {
                register: Register::Protection,
                read_back,
            });
        }
        let _status2 = self.get_feature_cmd(spi, Register::Status2)?;
        trace!("Status 2 after protection write {:02X}", _status2);
        Ok(())
    }

    /// Enable quad data lines
    fn quad_enable(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        self.set_feature_bits(spi, Features1::QE)
    }

    /// Map the OTP region over the array
    fn otp_enable(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        self.set_feature_bits(spi, Features1::OTP_EN)
    }

    /// Unmap the OTP region. OTP_PRT is never touched.
    fn otp_disable(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        self.clear_feature_bits(spi, Features1::OTP_EN)
    }

    // ============ Reset functions ============

    /// Reset command followed by its settle time
    fn soft_reset<D: DelayNs>(
        &self,
        spi: &mut T,
        delay: &mut D,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.reset_cmd(spi)?;
        delay.delay_ms(Self::SOFT_RESET_DELAY_MS);
        Ok(())
    }

    /// Enable reset then power on reset, each followed by its settle time
    fn power_on_reset<D: DelayNs>(
        &self,
        spi: &mut T,
        delay: &mut D,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.enable_power_on_reset_cmd(spi)?;
        delay.delay_ms(Self::ENABLE_RESET_DELAY_MS);
        self.power_on_reset_cmd(spi)?;
        delay.delay_ms(Self::POWER_ON_RESET_DELAY_MS);
        Ok(())
    }

    /// Read the ID and compare it with [QspiNand::JEDEC_MANUFACTURER_ID] and
    /// [QspiNand::JEDEC_DEVICE_ID]
    fn verify_id(&self, spi: &mut T) -> Result<JedecID, QspiNandError<T::Error>> {
        let found = self.read_jedec_id_cmd(spi)?;
        let expected = JedecID::new(Self::JEDEC_MANUFACTURER_ID, Self::JEDEC_DEVICE_ID);
        if found != expected {
            warn!(
                "ID mismatch, expected {:02X}{:02X} found {:02X}{:02X}",
                expected.manufacturer(),
                expected.device(),
                found.manufacturer(),
                found.device()
            );
            return Err(QspiNandError::IdMismatch { expected, found });
        }
        Ok(found)
    }

    // ============ OTP functions ============

    /// Read the start of an OTP page with single line cache reads.
    ///
    /// The OTP region is disabled again even if the read failed.
    fn read_otp_page<D: DelayNs>(
        &self,
        spi: &mut T,
        delay: &mut D,
        page: PageIndex,
        buf: &mut [u8],
        settle_ms: u32,
    ) -> Result<(), QspiNandError<T::Error>> {
        Self::check_cache_range(ColumnAddress::new(0), buf.len())?;
        let result = self.otp_enable(spi).and_then(|()| {
            self.page_read(spi, page)?;
            self.read_cache_cmd(spi, ReadMode::X1, ColumnAddress::new(0), buf)?;
            delay.delay_ms(settle_ms);
            Ok(())
        });
        let disable = self.otp_disable(spi);
        result.and(disable)
    }

    /// Read the 32 byte factory unique ID
    fn read_uid<D: DelayNs>(
        &self,
        spi: &mut T,
        delay: &mut D,
        buf: &mut [u8; 32],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.read_otp_page(
            spi,
            delay,
            PageIndex::new(Self::UID_PAGE),
            buf,
            Self::UID_SETTLE_DELAY_MS,
        )
    }

    /// Read the first 128 bytes of the parameter page
    fn read_parameter_page<D: DelayNs>(
        &self,
        spi: &mut T,
        delay: &mut D,
        buf: &mut [u8; 128],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.read_otp_page(
            spi,
            delay,
            PageIndex::new(Self::PARAMETER_PAGE),
            buf,
            Self::PARAMETER_PAGE_SETTLE_DELAY_MS,
        )
    }

    // ============ Bad Block functions ============

    /// Raw bad block marker of the page, 0xFF on a good block.
    /// Interpreting the byte is left to the caller.
    fn bad_block_marker(
        &self,
        spi: &mut T,
        page: PageIndex,
    ) -> Result<u8, QspiNandError<T::Error>> {
        Self::check_page(page)?;
        self.page_read(spi, page)?;
        let mut buf = [0; 1];
        self.read_cache_cmd(
            spi,
            ReadMode::QuadIo,
            ColumnAddress::new(Self::BAD_BLOCK_MARKER_OFFSET),
            &mut buf,
        )?;
        Ok(buf[0])
    }

    /// Check if the block is marked as bad
    fn block_marked_bad(
        &self,
        spi: &mut T,
        block: BlockIndex,
    ) -> Result<bool, QspiNandError<T::Error>> {
        let marker = self.bad_block_marker(spi, block.as_page_index(Self::PAGES_PER_BLOCK))?;
        Ok(marker != 0xFF)
    }

    // ============= RWE functions =============

    /// Write enable, then wait for the latch
    fn write_enable(&self, spi: &mut T) -> Result<(), QspiNandError<T::Error>> {
        self.write_enable_cmd(spi)?;
        self.check_status(spi, StatusCheck::WriteEnableLatch)?;
        Ok(())
    }

    /// Read a page into the device cache and wait for it to finish
    fn page_read(&self, spi: &mut T, page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        self.page_read_cmd(spi, page)?;
        self.check_status(spi, StatusCheck::Idle)?;
        Ok(())
    }

    /// Program the cache into `page`, then wait and check P_FAIL
    fn program_execute(&self, spi: &mut T, page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        self.program_execute_cmd(spi, page)?;
        self.check_status(spi, StatusCheck::NoError(Status::P_FAIL))?;
        Ok(())
    }

    /// Erase a block.
    ///
    /// `page` must be the first page of the block.
    fn erase_block(&self, spi: &mut T, page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        if !page.is_block_aligned(Self::PAGES_PER_BLOCK) {
            return Err(QspiNandError::NotAligned);
        }
        Self::check_page(page)?;
        debug!(
            "Erasing block {}",
            page.as_block_index(Self::PAGES_PER_BLOCK).as_u16()
        );
        self.write_enable(spi)?;
        self.block_erase_cmd(spi, page)?;
        self.check_status(spi, StatusCheck::NoError(Status::E_FAIL))?;
        Ok(())
    }

    /// Erase every block.
    ///
    /// Returns the number of blocks erased. Failed blocks are skipped,
    /// a bus failure ends the sweep.
    fn erase_all(&self, spi: &mut T) -> Result<u32, QspiNandError<T::Error>> {
        let mut erased = 0;
        for block in 0..Self::BLOCK_COUNT {
            match self.erase_block(spi, PageIndex::new(block * Self::PAGES_PER_BLOCK)) {
                Ok(()) => erased += 1,
                Err(e @ (QspiNandError::Transport(_) | QspiNandError::TransferTimeout)) => {
                    return Err(e)
                }
                Err(_) => warn!("Erase of block {} failed", block),
            }
        }
        info!("Erased {} of {} blocks", erased, Self::BLOCK_COUNT);
        Ok(erased)
    }

    /// Read a slice from a page, starting at `column` in the cache.
    ///
    /// Returns the ECC status of the read, or [QspiNandError::EccUncorrectable]
    /// if status register 1 reaches [QspiNand::ECC_UNCORRECTABLE_THRESHOLD].
    fn read_page_slice(
        &self,
        spi: &mut T,
        page: PageIndex,
        mode: ReadMode,
        column: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<ECCStatus, QspiNandError<T::Error>> {
        Self::check_cache_range(column, buf.len())?;
        Self::check_page(page)?;
        self.page_read(spi, page)?;
        self.read_cache_cmd(spi, mode, column, buf)?;
        let status = self.read_status(spi)?;
        if status.bits() >= Self::ECC_UNCORRECTABLE_THRESHOLD {
            warn!("Uncorrectable ECC error on page {}", page.as_u32());
            return Err(QspiNandError::EccUncorrectable);
        }
        let ecc = status.ecc();
        if ecc != ECCStatus::Ok {
            warn!("ECC corrected bit flips on page {}", page.as_u32());
        }
        Ok(ecc)
    }

    /// Read from the start of a page
    fn read_page(
        &self,
        spi: &mut T,
        page: PageIndex,
        mode: ReadMode,
        buf: &mut [u8],
    ) -> Result<ECCStatus, QspiNandError<T::Error>> {
        self.read_page_slice(spi, page, mode, ColumnAddress::new(0), buf)
    }

    /// Write a slice to a page, starting at `column` in the cache.
    ///
    /// Order is write enable, program load, program execute. Write disable
    /// is always sent afterwards, whatever the outcome.
    /// The block must be erased first.
    fn write_page_slice(
        &self,
        spi: &mut T,
        page: PageIndex,
        mode: ProgramMode,
        column: ColumnAddress,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        Self::check_cache_range(column, buf.len())?;
        Self::check_page(page)?;
        debug!("Programming {} bytes to page {}", buf.len(), page.as_u32());
        let result = self.write_enable(spi).and_then(|()| {
            self.program_load_cmd(spi, mode, column, buf)?;
            self.program_execute(spi, page)
        });
        let disable = self.write_disable_cmd(spi);
        result.and(disable)
    }

    /// Write from the start of a page
    fn write_page(
        &self,
        spi: &mut T,
        page: PageIndex,
        mode: ProgramMode,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.write_page_slice(spi, page, mode, ColumnAddress::new(0), buf)
    }

    /// Read from the spare area, starting at the bad block marker
    fn read_spare(
        &self,
        spi: &mut T,
        page: PageIndex,
        buf: &mut [u8],
    ) -> Result<ECCStatus, QspiNandError<T::Error>> {
        self.read_page_slice(
            spi,
            page,
            ReadMode::QuadIo,
            ColumnAddress::new(Self::BAD_BLOCK_MARKER_OFFSET),
            buf,
        )
    }

    /// Program the spare area, starting at the bad block marker.
    ///
    /// Uses a random load so the rest of the cache is programmed as is.
    fn write_spare(
        &self,
        spi: &mut T,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.write_page_slice(
            spi,
            page,
            ProgramMode::RandomLoadX4,
            ColumnAddress::new(Self::BAD_BLOCK_MARKER_OFFSET),
            buf,
        )
    }

    /// Read the ECC parity bytes of a page
    fn read_ecc(
        &self,
        spi: &mut T,
        page: PageIndex,
        buf: &mut [u8; ECC_AREA_SIZE],
    ) -> Result<(), QspiNandError<T::Error>> {
        Self::check_page(page)?;
        self.page_read(spi, page)?;
        self.read_cache_cmd(
            spi,
            ReadMode::QuadIo,
            ColumnAddress::new(Self::ECC_OFFSET),
            buf,
        )
    }

    // ============ Data migration ============

    /// Move a page inside the device.
    ///
    /// The spare area goes first, then the main data is loaded into the
    /// cache from `src` and programmed to `dest` without leaving the chip.
    fn move_page(
        &self,
        spi: &mut T,
        src: PageIndex,
        dest: PageIndex,
    ) -> Result<(), QspiNandError<T::Error>> {
        trace!("Moving page {} to {}", src.as_u32(), dest.as_u32());
        let mut spare = [0; SPARE_AREA_SIZE];
        self.read_spare(spi, src, &mut spare)?;
        self.write_spare(spi, dest, &spare)?;

        self.page_read(spi, src)?;
        let result = self
            .write_enable(spi)
            .and_then(|()| self.program_execute(spi, dest));
        let disable = self.write_disable_cmd(spi);
        result.and(disable)
    }

    /// Move a whole block inside the device.
    ///
    /// Erases `dest`, then moves every page except `ignore_page`.
    /// Returns how many pages moved. Page failures are logged and left out
    /// of the count, a failed erase of `dest` is returned as an error.
    /// `src` and `dest` must differ.
    fn move_block(
        &self,
        spi: &mut T,
        src: BlockIndex,
        dest: BlockIndex,
        ignore_page: Option<u32>,
    ) -> Result<u32, QspiNandError<T::Error>> {
        if src.as_u16() as u32 >= Self::BLOCK_COUNT || dest.as_u16() as u32 >= Self::BLOCK_COUNT {
            return Err(QspiNandError::OutOfBounds);
        }
        if src == dest {
            return Err(QspiNandError::Overlap);
        }
        debug!("Moving block {} to {}", src.as_u16(), dest.as_u16());
        self.erase_block(spi, dest.as_page_index(Self::PAGES_PER_BLOCK))?;

        let mut moved = 0;
        let pages = PageIter::new(src, Self::PAGES_PER_BLOCK)
            .filter(|p| Some(p.page_in_block(Self::PAGES_PER_BLOCK)) != ignore_page);
        for from in pages {
            let page = from.page_in_block(Self::PAGES_PER_BLOCK);
            let to = PageIndex::from_block_and_page(dest, page, Self::PAGES_PER_BLOCK);
            match self.move_page(spi, from, to) {
                Ok(()) => moved += 1,
                Err(_) => warn!("Move of page {} to {} failed", from.as_u32(), to.as_u32()),
            }
        }
        Ok(moved)
    }

    // ============ Range checks ============

    /// Column and length must stay inside the cache
    fn check_cache_range(column: ColumnAddress, len: usize) -> Result<(), QspiNandError<T::Error>> {
        if column.as_u16() as usize + len > Self::CACHE_SIZE as usize {
            return Err(QspiNandError::OutOfBounds);
        }
        Ok(())
    }

    /// Row address must be inside the array
    fn check_page(page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        if page.as_u32() >= Self::PAGES_PER_BLOCK * Self::BLOCK_COUNT {
            return Err(QspiNandError::OutOfBounds);
        }
        Ok(())
    }
}

pub mod utils {
    use crate::{
        command::QspiCommand,
        error::QspiNandError,
        transport::{QspiTransport, TransferState},
    };

    /// Wrapper around [QspiTransport::command] that maps errors
    pub fn send<T: QspiTransport>(
        spi: &mut T,
        cmd: &QspiCommand,
    ) -> Result<(), QspiNandError<T::Error>> {
        spi.command(cmd).map_err(QspiNandError::Transport)
    }

    /// Send `cmd` and read its data phase into `buf`
    pub fn receive<T: QspiTransport>(
        spi: &mut T,
        cmd: &QspiCommand,
        buf: &mut [u8],
        attempts: u32,
    ) -> Result<(), QspiNandError<T::Error>> {
        send(spi, cmd)?;
        let state = spi.receive(buf).map_err(QspiNandError::Transport)?;
        wait_transfer(spi, state, attempts)
    }

    /// Send `cmd` and write its data phase from `buf`
    pub fn transmit<T: QspiTransport>(
        spi: &mut T,
        cmd: &QspiCommand,
        buf: &[u8],
        attempts: u32,
    ) -> Result<(), QspiNandError<T::Error>> {
        send(spi, cmd)?;
        let state = spi.transmit(buf).map_err(QspiNandError::Transport)?;
        wait_transfer(spi, state, attempts)
    }

    /// Spin on [QspiTransport::is_ready] until a pending transfer completes
    pub fn wait_transfer<T: QspiTransport>(
        spi: &mut T,
        state: TransferState,
        attempts: u32,
    ) -> Result<(), QspiNandError<T::Error>> {
        if state == TransferState::Complete {
            return Ok(());
        }
        for _ in 0..attempts {
            if spi.is_ready().map_err(QspiNandError::Transport)? {
                return Ok(());
            }
        }
        error!("Transfer not ready after {} checks", attempts);
        Err(QspiNandError::TransferTimeout)
    }
}
