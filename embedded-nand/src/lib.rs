//! Device independent view of a raw NAND flash.
//!
//! Holds the address newtypes shared by the drivers, the [NandFlash] trait a
//! translation layer or file system is written against, and the bounds
//! helpers drivers use to validate the ranges they are handed.
#![no_std]

mod address;
pub mod iter;
pub use address::{AddressConversions, BlockIndex, ByteAddress, ColumnAddress, PageIndex};

pub trait NandFlashError {
    /// Map a driver error onto a [NandFlashErrorKind]
    fn kind(&self) -> NandFlashErrorKind;
}

/// Shared error type of a [NandFlash] implementation
pub trait ErrorType {
    type Error: NandFlashError;
}

/// Generic NAND flash errors.
///
/// Every driver error converts into one of these through [NandFlashError],
/// so upper layers can decide on retries and block retirement without
/// knowing the part.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum NandFlashErrorKind {
    /// Offset or length not a multiple of the required unit
    NotAligned,

    /// Range runs past the end of the device
    OutOfBounds,

    /// The device reported a failed erase, program or uncorrectable read.
    /// Carries the byte address of the block when known.
    BlockFail(Option<u32>),

    /// The operation succeeded but the block is wearing out, such as a read
    /// that needed ECC correction. Carries the byte address when known.
    BlockFailing(Option<u32>),

    /// Anything else, such as a bus error
    Other,
}

/// Raw NAND flash device used by a flash translation layer or file system.
///
/// No remapping, no wear levelling and no bad block table live here. Bad
/// blocks are found with [NandFlash::block_status] and left to the caller.
pub trait NandFlash: ErrorType {
    /// Smallest read unit in bytes
    const READ_SIZE: usize;

    /// Main area of a page in bytes
    const PAGE_SIZE: usize;

    const PAGES_PER_BLOCK: usize;

    const BLOCK_COUNT: usize;

    /// Smallest erase unit in bytes, one block
    const ERASE_SIZE: usize;

    /// Smallest program unit in bytes
    const WRITE_SIZE: usize;

    /// Fill `bytes` starting at byte `offset`.
    ///
    /// # Errors
    ///
    /// Misaligned or out of bounds ranges are rejected, see [check_read].
    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// Size of the main area of the whole device in bytes
    fn capacity(&self) -> u32;

    /// Read the bad block marker of `block`
    fn block_status(&mut self, block: BlockIndex) -> Result<BlockStatus, Self::Error>;

    fn block_is_bad(&mut self, block: BlockIndex) -> Result<bool, Self::Error> {
        Ok(self.block_status(block)?.is_bad())
    }

    /// Erase every block in the byte range `[from..to]`, leaving it all 0xFF.
    ///
    /// Contents of a block are undefined if power is lost during its erase.
    ///
    /// # Errors
    ///
    /// Both ends must be block aligned and `from <= to <= capacity`, see
    /// [check_erase].
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error>;

    fn erase_block(&mut self, block: BlockIndex) -> Result<(), Self::Error>;

    /// Program `bytes` starting at byte `offset`.
    ///
    /// Pages must be erased first and each page may only be programmed once
    /// between erases.
    ///
    /// # Errors
    ///
    /// Misaligned or out of bounds ranges are rejected, see [check_write].
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Copy `length` bytes from `src_offset` to `dest_offset`.
    ///
    /// Devices with an internal page copy move the data without it crossing
    /// the bus.
    fn copy(&mut self, src_offset: u32, dest_offset: u32, length: u32) -> Result<(), Self::Error>;

    /// Iterate over block indices starting at `start`
    fn block_iter(&self, start: BlockIndex) -> iter::BlockIter {
        iter::BlockIter::new(start, Self::BLOCK_COUNT as u16)
    }

    /// Iterate over the row addresses of the pages in `block`
    fn page_iter(&self, block: BlockIndex) -> iter::PageIter {
        iter::PageIter::new(block, Self::PAGES_PER_BLOCK as u32)
    }
}

/// Bad block marker state of a block
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum BlockStatus {
    /// Marker reads 0xFF
    Ok,
    /// Marker reads anything else
    Failed,
}

impl BlockStatus {
    /// Classify a raw bad block marker byte
    pub const fn from_marker(marker: u8) -> Self {
        if marker == 0xFF {
            BlockStatus::Ok
        } else {
            BlockStatus::Failed
        }
    }

    pub const fn is_bad(&self) -> bool {
        matches!(self, BlockStatus::Failed)
    }
}

/// Check a read of `length` bytes at `offset`
pub fn check_read<T: NandFlash>(
    flash: &T,
    offset: u32,
    length: usize,
) -> Result<(), NandFlashErrorKind> {
    check_slice(flash, T::READ_SIZE, offset, length)
}

/// Check an erase of `[from..to]`, both ends block aligned
pub fn check_erase<T: NandFlash>(flash: &T, from: u32, to: u32) -> Result<(), NandFlashErrorKind> {
    if from > to || to > flash.capacity() {
        return Err(NandFlashErrorKind::OutOfBounds);
    }
    let erase_size = T::ERASE_SIZE as u32;
    if from % erase_size != 0 || to % erase_size != 0 {
        return Err(NandFlashErrorKind::NotAligned);
    }
    Ok(())
}

/// Check a write of `length` bytes at `offset`
pub fn check_write<T: NandFlash>(
    flash: &T,
    offset: u32,
    length: usize,
) -> Result<(), NandFlashErrorKind> {
    check_slice(flash, T::WRITE_SIZE, offset, length)
}

/// Bounds are checked before alignment
pub fn check_slice<T: NandFlash>(
    flash: &T,
    align: usize,
    offset: u32,
    length: usize,
) -> Result<(), NandFlashErrorKind> {
    let capacity = flash.capacity();
    if length as u32 > capacity || offset > capacity - length as u32 {
        return Err(NandFlashErrorKind::OutOfBounds);
    }
    if offset % align as u32 != 0 || length % align != 0 {
        return Err(NandFlashErrorKind::NotAligned);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    /// Four block device with block 2 marked bad
    struct Geometry;

    #[derive(Debug)]
    struct Never;

    impl NandFlashError for Never {
        fn kind(&self) -> NandFlashErrorKind {
            NandFlashErrorKind::Other
        }
    }

    impl ErrorType for Geometry {
        type Error = Never;
    }

    impl NandFlash for Geometry {
        const READ_SIZE: usize = 1;
        const PAGE_SIZE: usize = 2048;
        const PAGES_PER_BLOCK: usize = 64;
        const BLOCK_COUNT: usize = 4;
        const ERASE_SIZE: usize = 2048 * 64;
        const WRITE_SIZE: usize = 2048;

        fn read(&mut self, _offset: u32, _bytes: &mut [u8]) -> Result<(), Never> {
            Ok(())
        }

        fn capacity(&self) -> u32 {
            (Self::ERASE_SIZE * Self::BLOCK_COUNT) as u32
        }

        fn block_status(&mut self, block: BlockIndex) -> Result<BlockStatus, Never> {
            Ok(BlockStatus::from_marker(if block.as_u16() == 2 {
                0x00
            } else {
                0xFF
            }))
        }

        fn erase(&mut self, _from: u32, _to: u32) -> Result<(), Never> {
            Ok(())
        }

        fn erase_block(&mut self, _block: BlockIndex) -> Result<(), Never> {
            Ok(())
        }

        fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Never> {
            Ok(())
        }

        fn copy(&mut self, _src: u32, _dest: u32, _length: u32) -> Result<(), Never> {
            Ok(())
        }
    }

    const BLOCK: u32 = 2048 * 64;

    #[test]
    fn erase_range_checks() {
        let flash = Geometry;
        assert_eq!(check_erase(&flash, 0, BLOCK), Ok(()));
        assert_eq!(check_erase(&flash, BLOCK, BLOCK), Ok(()));
        assert_eq!(check_erase(&flash, 0, 4 * BLOCK), Ok(()));
        assert_eq!(
            check_erase(&flash, 0, 5 * BLOCK),
            Err(NandFlashErrorKind::OutOfBounds)
        );
        assert_eq!(
            check_erase(&flash, 2 * BLOCK, BLOCK),
            Err(NandFlashErrorKind::OutOfBounds)
        );
        assert_eq!(
            check_erase(&flash, 2048, BLOCK),
            Err(NandFlashErrorKind::NotAligned)
        );
    }

    #[test]
    fn write_must_cover_whole_pages() {
        let flash = Geometry;
        assert_eq!(check_write(&flash, 2048, 4096), Ok(()));
        assert_eq!(
            check_write(&flash, 2048, 100),
            Err(NandFlashErrorKind::NotAligned)
        );
        assert_eq!(
            check_write(&flash, 1, 2048),
            Err(NandFlashErrorKind::NotAligned)
        );
    }

    #[test]
    fn read_any_byte_range_inside_device() {
        let flash = Geometry;
        let capacity = flash.capacity();
        assert_eq!(check_read(&flash, 3, 17), Ok(()));
        assert_eq!(check_read(&flash, capacity - 1, 1), Ok(()));
        assert_eq!(
            check_read(&flash, capacity, 1),
            Err(NandFlashErrorKind::OutOfBounds)
        );
        assert_eq!(
            check_read(&flash, 0, capacity as usize + 1),
            Err(NandFlashErrorKind::OutOfBounds)
        );
    }

    #[test]
    fn marker_byte_classifies_block() {
        assert_eq!(BlockStatus::from_marker(0xFF), BlockStatus::Ok);
        assert_eq!(BlockStatus::from_marker(0x00), BlockStatus::Failed);
        assert_eq!(BlockStatus::from_marker(0xFE), BlockStatus::Failed);

        let mut flash = Geometry;
        let mut bad = 0;
        for block in flash.block_iter(BlockIndex::new(0)) {
            if flash.block_is_bad(block).unwrap() {
                bad += 1;
            }
        }
        assert_eq!(bad, 1);
        assert!(matches!(flash.block_is_bad(BlockIndex::new(2)), Ok(true)));
        assert!(matches!(flash.block_is_bad(BlockIndex::new(1)), Ok(false)));
    }
}
