use crate::{BlockIndex, PageIndex};

/// Iterate over the blocks of a nand flash
pub struct BlockIter {
    pub(crate) count: u16,
    pub(crate) block_count: u16,
}

impl BlockIter {
    pub fn new(start: BlockIndex, block_count: u16) -> Self {
        BlockIter {
            count: start.as_u16(),
            block_count,
        }
    }
}

impl Iterator for BlockIter {
    type Item = BlockIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count < self.block_count {
            let block = BlockIndex::new(self.count);
            self.count += 1;
            Some(block)
        } else {
            None
        }
    }
}

/// Iterate over the pages of a single block
pub struct PageIter {
    pub(crate) next: u32,
    pub(crate) end: u32,
}

impl PageIter {
    pub fn new(block: BlockIndex, pages_per_block: u32) -> Self {
        let first = block.as_page_index(pages_per_block).as_u32();
        PageIter {
            next: first,
            end: first + pages_per_block,
        }
    }
}

impl Iterator for PageIter {
    type Item = PageIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < self.end {
            let page = PageIndex::new(self.next);
            self.next += 1;
            Some(page)
        } else {
            None
        }
    }
}
