use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_nand::{
    check_erase, check_read, check_slice, check_write, AddressConversions, BlockIndex, BlockStatus,
    ByteAddress, ColumnAddress, ErrorType, NandFlash, PageIndex,
};

use crate::{
    cmd_blocking::QspiNandBlocking,
    command::{ProgramMode, ReadMode},
    error::QspiNandError,
    info::{check_uid, DeviceInfo, InitState, PARAMETER_PAGE_LEN, UID_LEN},
    register::{Features1, Status},
    transport::QspiTransport,
    ECCStatus, JedecID, ECC_AREA_SIZE,
};

/// Bus widths used by the [NandFlash] implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Cache read variant for page reads
    pub read_mode: ReadMode,
    /// Program load variant for page writes
    pub program_mode: ProgramMode,
}

/// Concrete type that implements all the flash device features.
///
/// This type is generic over the QSPI transport and the flash device.
/// The device D supplies the layout and commands through [crate::QspiNand]
/// and [QspiNandBlocking], which can be overridden per part.
///
/// [QspiNandDevice] owns the transport and lends it to every command. It
/// runs the initialization sequence, keeps the identity data read from
/// the OTP region and implements the [embedded_nand::NandFlash] trait for a
/// flash translation layer (FTL) / bad block management (BBM) / file system.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QspiNandDevice<T, D, const N: usize> {
    pub transport: T,
    pub device: D,
    config: DeviceConfig,
    state: InitState,
    info: Option<DeviceInfo>,
}

// Manually implement Debug to avoid bounds on T
// D must implement Debug, which should be fine as its just data
impl<T, D, const N: usize> Debug for QspiNandDevice<T, D, N>
where
    D: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QspiNandDevice")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

impl<T, D, const N: usize> QspiNandDevice<T, D, N> {
    /// Create a new [QspiNandDevice] with the given transport and flash device.
    ///
    /// Call [QspiNandDevice::initialize] before use.
    pub fn new(transport: T, device: D) -> Self {
        Self::new_with_config(transport, device, DeviceConfig::default())
    }

    pub fn new_with_config(transport: T, device: D, config: DeviceConfig) -> Self {
        QspiNandDevice {
            transport,
            device,
            config,
            state: InitState::Uninitialized,
            info: None,
        }
    }

    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    pub fn set_config(&mut self, config: DeviceConfig) {
        self.config = config;
    }

    /// Furthest initialization step reached
    pub fn state(&self) -> InitState {
        self.state
    }

    /// Give back the transport and the device
    pub fn release(self) -> (T, D) {
        (self.transport, self.device)
    }
}

impl<T: QspiTransport, D: QspiNandBlocking<T, N>, const N: usize> QspiNandDevice<T, D, N> {
    /// Bring the device up.
    ///
    /// Runs power on reset, checks the ID, enables quad lines, reads and
    /// checks the unique ID and parameter page, then clears block
    /// protection. Stops at the first failing step and leaves
    /// [QspiNandDevice::state] at the last step that completed.
    pub fn initialize<DL: DelayNs>(
        &mut self,
        delay: &mut DL,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.state = InitState::Uninitialized;
        self.info = None;

        self.power_on_reset(delay)?;
        self.state = InitState::Reset;

        let id = match self.device.verify_id(&mut self.transport) {
            Ok(id) => id,
            Err(e @ QspiNandError::IdMismatch { .. }) => {
                self.state = InitState::IdMismatch;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        info!(
            "Found device {:02X}{:02X}",
            id.manufacturer(),
            id.device()
        );
        self.state = InitState::IdVerified;

        self.device.quad_enable(&mut self.transport)?;
        self.state = InitState::FeatureConfigured;

        let mut uid = [0; UID_LEN];
        self.device.read_uid(&mut self.transport, delay, &mut uid)?;
        if !check_uid(&uid) {
            error!("Unique ID failed its complement check");
            return Err(QspiNandError::UidIntegrity);
        }
        let mut parameter_page = [0; PARAMETER_PAGE_LEN];
        self.device
            .read_parameter_page(&mut self.transport, delay, &mut parameter_page)?;
        let info = DeviceInfo::new(uid, parameter_page);
        self.state = InitState::InfoRead;

        self.device.set_protection(&mut self.transport, 0x00)?;
        self.state = InitState::ProtectionCleared;

        self.info = Some(info);
        self.state = InitState::Ready;
        info!("Device ready");
        Ok(())
    }

    /// Enable reset then power on reset, with the settle delays
    pub fn power_on_reset<DL: DelayNs>(
        &mut self,
        delay: &mut DL,
    ) -> Result<(), QspiNandError<T::Error>> {
        info!("Power on reset");
        self.device.power_on_reset(&mut self.transport, delay)
    }

    /// Reset command with its settle delay
    pub fn soft_reset<DL: DelayNs>(
        &mut self,
        delay: &mut DL,
    ) -> Result<(), QspiNandError<T::Error>> {
        info!("Soft reset");
        self.device.soft_reset(&mut self.transport, delay)
    }

    /// Get the Jedec ID of the flash device
    pub fn jedec_blocking(&mut self) -> Result<JedecID, QspiNandError<T::Error>> {
        self.device.read_jedec_id_cmd(&mut self.transport)
    }

    /// Unique ID and parameter page, available once [InitState::Ready]
    pub fn info(&self) -> Result<&DeviceInfo, QspiNandError<T::Error>> {
        self.info.as_ref().ok_or(QspiNandError::NotInitialized)
    }

    pub fn uid(&self) -> Result<&[u8; UID_LEN], QspiNandError<T::Error>> {
        Ok(self.info()?.uid())
    }

    pub fn parameter_page(&self) -> Result<&[u8; PARAMETER_PAGE_LEN], QspiNandError<T::Error>> {
        Ok(self.info()?.parameter_page())
    }

    /// Read status register 1
    pub fn status_blocking(&mut self) -> Result<Status, QspiNandError<T::Error>> {
        self.device.read_status(&mut self.transport)
    }

    /// Read feature register 1
    pub fn features_blocking(&mut self) -> Result<Features1, QspiNandError<T::Error>> {
        self.device.read_feature_reg(&mut self.transport)
    }

    pub fn set_features_blocking(
        &mut self,
        bits: Features1,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.set_feature_bits(&mut self.transport, bits)
    }

    pub fn clear_features_blocking(
        &mut self,
        bits: Features1,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.clear_feature_bits(&mut self.transport, bits)
    }

    /// Read the block protection register
    pub fn protection_blocking(&mut self) -> Result<u8, QspiNandError<T::Error>> {
        self.device.get_protection(&mut self.transport)
    }

    /// Write and verify the block protection register
    pub fn set_protection_blocking(&mut self, value: u8) -> Result<(), QspiNandError<T::Error>> {
        self.device.set_protection(&mut self.transport, value)
    }

    /// Erase the block starting at `page`
    pub fn erase_block_blocking(&mut self, page: PageIndex) -> Result<(), QspiNandError<T::Error>> {
        self.device.erase_block(&mut self.transport, page)
    }

    /// Erase every block, returns how many erased
    pub fn erase_all_blocking(&mut self) -> Result<u32, QspiNandError<T::Error>> {
        self.device.erase_all(&mut self.transport)
    }

    /// Read a slice of a page with the configured read mode.
    /// Checks for ECC errors.
    pub fn read_page_slice_blocking(
        &mut self,
        page: PageIndex,
        column: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<ECCStatus, QspiNandError<T::Error>> {
        self.device
            .read_page_slice(&mut self.transport, page, self.config.read_mode, column, buf)
    }

    /// Read a page with an explicit cache read variant
    pub fn read_page_blocking(
        &mut self,
        page: PageIndex,
        mode: ReadMode,
        buf: &mut [u8],
    ) -> Result<ECCStatus, QspiNandError<T::Error>> {
        self.device.read_page(&mut self.transport, page, mode, buf)
    }

    /// Write a slice of a page with the configured program mode.
    /// The block must be erased before writing.
    pub fn write_page_slice_blocking(
        &mut self,
        page: PageIndex,
        column: ColumnAddress,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.write_page_slice(
            &mut self.transport,
            page,
            self.config.program_mode,
            column,
            buf,
        )
    }

    /// Write a page with an explicit program load variant
    pub fn write_page_blocking(
        &mut self,
        page: PageIndex,
        mode: ProgramMode,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.write_page(&mut self.transport, page, mode, buf)
    }

    /// Raw bad block marker byte of a page
    pub fn bad_block_marker_blocking(
        &mut self,
        page: PageIndex,
    ) -> Result<u8, QspiNandError<T::Error>> {
        self.device.bad_block_marker(&mut self.transport, page)
    }

    pub fn read_spare_blocking(
        &mut self,
        page: PageIndex,
        buf: &mut [u8],
    ) -> Result<ECCStatus, QspiNandError<T::Error>> {
        self.device.read_spare(&mut self.transport, page, buf)
    }

    pub fn write_spare_blocking(
        &mut self,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.write_spare(&mut self.transport, page, buf)
    }

    pub fn read_ecc_blocking(
        &mut self,
        page: PageIndex,
        buf: &mut [u8; ECC_AREA_SIZE],
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.read_ecc(&mut self.transport, page, buf)
    }

    /// Copy a page to another using the device cache
    pub fn move_page_blocking(
        &mut self,
        src: PageIndex,
        dest: PageIndex,
    ) -> Result<(), QspiNandError<T::Error>> {
        self.device.move_page(&mut self.transport, src, dest)
    }

    /// Copy a block to another, skipping `ignore_page`.
    /// Returns the number of pages moved.
    pub fn move_block_blocking(
        &mut self,
        src: BlockIndex,
        dest: BlockIndex,
        ignore_page: Option<u32>,
    ) -> Result<u32, QspiNandError<T::Error>> {
        self.device
            .move_block(&mut self.transport, src, dest, ignore_page)
    }
}

impl<T: QspiTransport, D, const N: usize> ErrorType for QspiNandDevice<T, D, N> {
    type Error = QspiNandError<T::Error>;
}

impl<T: QspiTransport, D: QspiNandBlocking<T, N>, const N: usize> NandFlash
    for QspiNandDevice<T, D, N>
{
    const READ_SIZE: usize = D::READ_SIZE as usize;
    const PAGE_SIZE: usize = D::PAGE_SIZE as usize;
    const BLOCK_COUNT: usize = D::BLOCK_COUNT as usize;
    const ERASE_SIZE: usize = D::BLOCK_SIZE as usize;
    const PAGES_PER_BLOCK: usize = D::PAGES_PER_BLOCK as usize;
    const WRITE_SIZE: usize = 1;

    fn read(&mut self, offset: u32, mut bytes: &mut [u8]) -> Result<(), Self::Error> {
        trace!("Reading {} bytes from offset {}", bytes.len(), offset);
        // Check that the requested read is aligned and within bounds
        check_read(self, offset, bytes.len())?;

        // Check if the first page is whole
        let ba = ByteAddress::new(offset);
        let ca = ba.as_column_address(D::PAGE_SIZE);
        let mut pa = ba.as_page_index(D::PAGE_SIZE);
        if ca.as_u16() != 0 {
            // number of bytes in rest of page
            let remaining = D::PAGE_SIZE as usize - ca.as_u16() as usize;
            let read_len = bytes.len().min(remaining);
            trace!(
                "Partial read {} bytes from page {} column {}",
                read_len,
                pa.as_u32(),
                ca.as_u16()
            );
            self.read_page_slice_blocking(pa, ca, &mut bytes[..read_len])?;
            bytes = &mut bytes[read_len..];
            pa.inc();
        }

        // read full pages.
        // If already read all bytes, 0 iterations
        for chunk in bytes.chunks_mut(D::PAGE_SIZE as usize) {
            self.read_page_slice_blocking(pa, ColumnAddress::new(0), chunk)?;
            pa.inc();
        }
        Ok(())
    }

    fn capacity(&self) -> u32 {
        D::CAPACITY
    }

    fn block_status(&mut self, block: BlockIndex) -> Result<BlockStatus, Self::Error> {
        if block.as_u16() as usize >= Self::BLOCK_COUNT {
            return Err(QspiNandError::OutOfBounds);
        }
        let page = block.as_page_index(D::PAGES_PER_BLOCK);
        let marker = self.device.bad_block_marker(&mut self.transport, page)?;
        Ok(BlockStatus::from_marker(marker))
    }

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        trace!("Erasing from {} to {}", from, to);
        // Check that the requested erase is aligned and within bounds
        check_erase(self, from, to)?;

        let start_block = Self::byte_to_block_index(ByteAddress::new(from));
        let end_block = Self::byte_to_block_index(ByteAddress::new(to));

        for block in start_block.as_u16()..end_block.as_u16() {
            self.erase_block(BlockIndex::new(block))?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, mut bytes: &[u8]) -> Result<(), Self::Error> {
        trace!("Writing {} bytes to offset {}", bytes.len(), offset);
        // Check that the requested write is aligned and within bounds
        check_write(self, offset, bytes.len())?;

        // Check if the first page is whole
        let ba = ByteAddress::new(offset);
        let ca = ba.as_column_address(D::PAGE_SIZE);
        let mut pa = ba.as_page_index(D::PAGE_SIZE);
        if ca.as_u16() != 0 {
            let remaining = D::PAGE_SIZE as usize - ca.as_u16() as usize;
            let write_len = bytes.len().min(remaining);
            self.write_page_slice_blocking(pa, ca, &bytes[..write_len])?;
            bytes = &bytes[write_len..];
            pa.inc();
        }

        // Write the remaining full and final partial/full page
        for chunk in bytes.chunks(D::PAGE_SIZE as usize) {
            self.write_page_slice_blocking(pa, ColumnAddress::new(0), chunk)?;
            pa.inc();
        }
        Ok(())
    }

    fn erase_block(&mut self, block: BlockIndex) -> Result<(), Self::Error> {
        trace!("Erasing block {}", block.as_u16());
        if block.as_u16() as usize >= Self::BLOCK_COUNT {
            return Err(QspiNandError::OutOfBounds);
        }
        self.erase_block_blocking(Self::block_to_page_index(block))
    }

    fn copy(&mut self, src_offset: u32, dest_offset: u32, length: u32) -> Result<(), Self::Error> {
        // Check that both read and write are aligned with pages and within bounds
        check_slice(self, Self::PAGE_SIZE, src_offset, length as usize)?;
        check_slice(self, Self::PAGE_SIZE, dest_offset, length as usize)?;
        if src_offset < dest_offset + length && dest_offset < src_offset + length {
            return Err(QspiNandError::Overlap);
        }

        let n_pages = length / Self::PAGE_SIZE as u32;
        let mut src_page = Self::byte_to_page_index(ByteAddress::new(src_offset));
        let mut dest_page = Self::byte_to_page_index(ByteAddress::new(dest_offset));
        for _ in 0..n_pages {
            self.move_page_blocking(src_page, dest_page)?;
            src_page.inc();
            dest_page.inc();
        }
        Ok(())
    }
}
