use crate::NandFlash;
use core::{
    fmt::Display,
    ops::{Add, AddAssign},
};

/// Raw row address of a page.
///
/// Selects a block and a page within it: `block * pages_per_block + page`.
/// This is the 24 bit address sent with page-to-cache, program-execute
/// and block-erase commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageIndex(pub(crate) u32);

impl PageIndex {
    pub const fn new(index: u32) -> Self {
        PageIndex(index)
    }
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
    pub fn inc(&mut self) {
        self.0 += 1;
    }

    /// Build a row address from a block and the page inside that block
    pub fn from_block_and_page(block: BlockIndex, page: u32, pages_per_block: u32) -> Self {
        PageIndex(block.0 as u32 * pages_per_block + page)
    }

    pub fn as_block_index(&self, pages_per_block: u32) -> BlockIndex {
        BlockIndex((self.0 / pages_per_block) as u16)
    }

    /// Index of the page inside its block
    pub fn page_in_block(&self, pages_per_block: u32) -> u32 {
        self.0 % pages_per_block
    }

    /// True if this is the first page of a block
    pub fn is_block_aligned(&self, pages_per_block: u32) -> bool {
        self.page_in_block(pages_per_block) == 0
    }

    pub fn as_byte_address(&self, page_size: u32) -> ByteAddress {
        ByteAddress(self.0 * page_size)
    }

    pub fn from_byte_address(ba: ByteAddress, page_size: u32) -> Self {
        PageIndex(ba.0 / page_size)
    }

    /// Convert from a [BlockIndex]
    pub fn from_block_address(ba: BlockIndex, pages_per_block: u32) -> Self {
        PageIndex(ba.0 as u32 * pages_per_block)
    }
}

impl From<PageIndex> for u32 {
    fn from(pa: PageIndex) -> Self {
        pa.as_u32()
    }
}

impl Add<u32> for PageIndex {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        PageIndex(self.0 + rhs)
    }
}

impl Display for PageIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Index of a block in the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockIndex(pub(crate) u16);

impl BlockIndex {
    pub const fn new(index: u16) -> Self {
        BlockIndex(index)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn as_page_index(&self, pages_per_block: u32) -> PageIndex {
        PageIndex((self.0 as u32) * pages_per_block)
    }

    pub fn as_byte_address(&self, block_size: u32) -> ByteAddress {
        ByteAddress((self.0 as u32) * block_size)
    }

    pub fn from_page_address(pa: PageIndex, pages_per_block: u32) -> Self {
        BlockIndex((pa.0 / pages_per_block) as u16)
    }

    pub fn from_byte_address(ba: ByteAddress, block_size: u32) -> Self {
        BlockIndex((ba.0 / (block_size)) as u16)
    }
}

impl From<BlockIndex> for u16 {
    fn from(bi: BlockIndex) -> Self {
        bi.as_u16()
    }
}

impl Add<u16> for BlockIndex {
    type Output = Self;

    fn add(self, rhs: u16) -> Self::Output {
        BlockIndex(self.0 + rhs)
    }
}

impl AddAssign<u16> for BlockIndex {
    fn add_assign(&mut self, rhs: u16) {
        self.0 += rhs;
    }
}

impl Display for BlockIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Linear address of a byte in the main area of the flash device.
///
/// Spare bytes are not part of this address space, so with 2048 byte pages
/// and 64 pages per block the block index is `address >> 17`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteAddress(pub(crate) u32);

impl ByteAddress {
    pub const fn new(address: u32) -> Self {
        ByteAddress(address)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_block_index(&self, block_size: u32) -> BlockIndex {
        BlockIndex((self.0 / block_size) as u16)
    }

    /// Number of bytes into the block
    pub fn block_offset(&self, block_size: u32) -> u32 {
        self.0 % block_size
    }

    pub fn as_page_index(&self, page_size: u32) -> PageIndex {
        PageIndex(self.0 / page_size)
    }

    pub fn as_column_address(&self, page_size: u32) -> ColumnAddress {
        ColumnAddress((self.0 % page_size) as u16)
    }
}

impl From<ByteAddress> for u32 {
    fn from(ba: ByteAddress) -> Self {
        ba.as_u32()
    }
}

impl Add<u32> for ByteAddress {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        ByteAddress(self.0 + rhs)
    }
}

impl AddAssign<u32> for ByteAddress {
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

impl Display for ByteAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Byte offset inside the device cache register.
///
/// Covers the main area followed by the spare area, so offsets at or past
/// the page size address out of band bytes (bad block marker, ECC parity).
/// Used by cache-read and program-load commands as a 16 bit address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnAddress(pub(crate) u16);

impl ColumnAddress {
    pub const fn new(address: u16) -> Self {
        ColumnAddress(address)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn from_byte_address(ba: ByteAddress, page_size: u32) -> Self {
        ColumnAddress((ba.0 % page_size) as u16)
    }
}

impl Display for ColumnAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Trait for converting between page and block indices and byte and column addresses
pub trait AddressConversions {
    fn page_to_byte_address(page: PageIndex) -> ByteAddress;
    fn page_to_block_index(page: PageIndex) -> BlockIndex;
    fn block_to_page_index(block: BlockIndex) -> PageIndex;
    fn block_to_byte_address(block: BlockIndex) -> ByteAddress;
    fn byte_to_page_index(byte: ByteAddress) -> PageIndex;
    fn byte_to_block_index(byte: ByteAddress) -> BlockIndex;
    fn byte_to_column_address(byte: ByteAddress) -> ColumnAddress;
    fn is_block_aligned(byte: ByteAddress) -> bool;
    fn is_page_aligned(byte: ByteAddress) -> bool;
}

impl<T: NandFlash> AddressConversions for T {
    fn page_to_byte_address(page: PageIndex) -> ByteAddress {
        page.as_byte_address(Self::PAGE_SIZE as u32)
    }
    fn page_to_block_index(page: PageIndex) -> BlockIndex {
        page.as_block_index(Self::PAGES_PER_BLOCK as u32)
    }
    fn block_to_page_index(block: BlockIndex) -> PageIndex {
        block.as_page_index(Self::PAGES_PER_BLOCK as u32)
    }
    fn block_to_byte_address(block: BlockIndex) -> ByteAddress {
        block.as_byte_address(Self::ERASE_SIZE as u32)
    }
    fn byte_to_page_index(byte: ByteAddress) -> PageIndex {
        byte.as_page_index(Self::PAGE_SIZE as u32)
    }
    fn byte_to_block_index(byte: ByteAddress) -> BlockIndex {
        byte.as_block_index(Self::ERASE_SIZE as u32)
    }
    fn byte_to_column_address(byte: ByteAddress) -> ColumnAddress {
        byte.as_column_address(Self::PAGE_SIZE as u32)
    }
    fn is_block_aligned(byte: ByteAddress) -> bool {
        byte.0 % Self::ERASE_SIZE as u32 == 0
    }
    fn is_page_aligned(byte: ByteAddress) -> bool {
        byte.0 % Self::PAGE_SIZE as u32 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const PAGE_SIZE: u32 = 2048;
    const PAGES_PER_BLOCK: u32 = 64;
    const BLOCK_SIZE: u32 = PAGE_SIZE * PAGES_PER_BLOCK;

    #[test]
    fn block_index_is_byte_address_shifted_by_17() {
        for address in [0, 0x1_FFFF, 0x2_0000, 0x2_0800, 0x0FFF_FFFF] {
            let ba = ByteAddress::new(address);
            assert_eq!(
                ba.as_block_index(BLOCK_SIZE).as_u16() as u32,
                address >> 17
            );
        }
    }

    #[test]
    fn row_address_round_trips_through_block_and_page() {
        for block in [0u16, 1, 7, 1024, 2047] {
            for page in [0u32, 1, 31, 63] {
                let row =
                    PageIndex::from_block_and_page(BlockIndex::new(block), page, PAGES_PER_BLOCK);
                assert_eq!(row.as_u32(), block as u32 * PAGES_PER_BLOCK + page);
                assert_eq!(row.as_block_index(PAGES_PER_BLOCK), BlockIndex::new(block));
                assert_eq!(row.page_in_block(PAGES_PER_BLOCK), page);
                assert_eq!(
                    PageIndex::from_block_and_page(
                        row.as_block_index(PAGES_PER_BLOCK),
                        row.page_in_block(PAGES_PER_BLOCK),
                        PAGES_PER_BLOCK
                    ),
                    row
                );
            }
        }
    }

    #[test]
    fn byte_address_and_row_address_agree_on_block() {
        let ba = ByteAddress::new(0x2_0000);
        let row = ba.as_page_index(PAGE_SIZE);
        assert_eq!(row.as_u32(), 64);
        assert!(row.is_block_aligned(PAGES_PER_BLOCK));
        assert_eq!(row.as_block_index(PAGES_PER_BLOCK), ba.as_block_index(BLOCK_SIZE));
        assert!(!PageIndex::new(65).is_block_aligned(PAGES_PER_BLOCK));
    }

    #[test]
    fn column_address_is_offset_in_page() {
        let ba = ByteAddress::new(3 * PAGE_SIZE + 17);
        assert_eq!(ba.as_column_address(PAGE_SIZE).as_u16(), 17);
        assert_eq!(ba.as_page_index(PAGE_SIZE).as_u32(), 3);
    }
}
