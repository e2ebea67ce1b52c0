use std::ops::Range;

use crate::{
    disk::{BLOCK_SIZE, NUM_BLOCKS},
    fs::config::{DIR_ENTRY_SIZE, INODE_SIZE, NUM_FILES},
};

/// 镜像的分区布局，依次为：
///
/// ===========================================================================
/// | 目录 | inode 表 | inode 位图 | 数据块位图 | 数据区 ...                  |
/// ===========================================================================
///
/// 各区大小都由容量常量推出，保证互不重叠且落在块数组之内。
/// 数据块位图每字节对应一个数据块，块数取刚好覆盖剩余所有数据块的最小值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    num_blocks: u32,
    num_files: u32,
    inode_start: u32,
    inode_bitmap_start: u32,
    block_bitmap_start: u32,
    first_data_block: u32,
}

impl RegionLayout {
    /// 65536 块 * 1KB，256 个文件，数据区从 790 号块开始
    pub const STANDARD: RegionLayout = RegionLayout::new(NUM_BLOCKS as u32, NUM_FILES);

    pub const fn new(num_blocks: u32, num_files: u32) -> Self {
        let bs = BLOCK_SIZE as u32;

        // 块号以 u16 存放在 inode 中
        assert!(num_blocks <= 1 << 16, "block indices must fit in u16");
        assert!(num_files > 0, "at least one file slot is required");

        let directory_blocks = (num_files * DIR_ENTRY_SIZE).div_ceil(bs);
        let inode_start = directory_blocks;
        let inode_blocks = (num_files * INODE_SIZE).div_ceil(bs);
        let inode_bitmap_start = inode_start + inode_blocks;
        let inode_bitmap_blocks = num_files.div_ceil(bs);
        let block_bitmap_start = inode_bitmap_start + inode_bitmap_blocks;
        assert!(block_bitmap_start < num_blocks, "metadata does not fit");

        // 每个位图块管理 bs 个数据块，再加上它自己
        let remaining = num_blocks - block_bitmap_start;
        let block_bitmap_blocks = remaining.div_ceil(bs + 1);
        let first_data_block = block_bitmap_start + block_bitmap_blocks;
        assert!(first_data_block < num_blocks, "no room for data blocks");

        Self {
            num_blocks,
            num_files,
            inode_start,
            inode_bitmap_start,
            block_bitmap_start,
            first_data_block,
        }
    }

    pub fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    pub fn num_files(&self) -> u32 {
        self.num_files
    }

    pub fn directory_blocks(&self) -> Range<u32> {
        0..self.inode_start
    }

    pub fn inode_blocks(&self) -> Range<u32> {
        self.inode_start..self.inode_bitmap_start
    }

    pub fn free_inode_bitmap_blocks(&self) -> Range<u32> {
        self.inode_bitmap_start..self.block_bitmap_start
    }

    pub fn free_block_bitmap_blocks(&self) -> Range<u32> {
        self.block_bitmap_start..self.first_data_block
    }

    pub fn first_data_block(&self) -> u32 {
        self.first_data_block
    }

    pub fn data_blocks(&self) -> Range<u32> {
        self.first_data_block..self.num_blocks
    }

    pub fn data_block_count(&self) -> u32 {
        self.num_blocks - self.first_data_block
    }

    pub fn is_data_block(&self, block: u32) -> bool {
        self.data_blocks().contains(&block)
    }

    pub fn image_bytes(&self) -> u64 {
        self.num_blocks as u64 * BLOCK_SIZE as u64
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self::STANDARD
    }
}

const _: () = assert!(RegionLayout::STANDARD.first_data_block == 790);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_matches_expected_offsets() {
        let layout = RegionLayout::STANDARD;
        assert_eq!(layout.directory_blocks(), 0..21);
        assert_eq!(layout.inode_blocks(), 21..725);
        assert_eq!(layout.free_inode_bitmap_blocks(), 725..726);
        assert_eq!(layout.free_block_bitmap_blocks(), 726..790);
        assert_eq!(layout.first_data_block(), 790);
        assert_eq!(layout.data_block_count(), 64_746);
        assert_eq!(layout.image_bytes(), 65_536 * 1024);
    }

    #[test]
    fn regions_hold_their_records() {
        for layout in [
            RegionLayout::STANDARD,
            RegionLayout::new(72, 4),
            RegionLayout::new(4096, 100),
        ] {
            let bs = BLOCK_SIZE as u32;
            let dir = layout.directory_blocks();
            let inodes = layout.inode_blocks();
            let ibm = layout.free_inode_bitmap_blocks();
            let bbm = layout.free_block_bitmap_blocks();

            assert_eq!(dir.end, inodes.start);
            assert_eq!(inodes.end, ibm.start);
            assert_eq!(ibm.end, bbm.start);
            assert_eq!(bbm.end, layout.first_data_block());

            assert!(dir.len() as u32 * bs >= layout.num_files() * DIR_ENTRY_SIZE);
            assert!(inodes.len() as u32 * bs >= layout.num_files() * INODE_SIZE);
            assert!(ibm.len() as u32 * bs >= layout.num_files());
            assert!(bbm.len() as u32 * bs >= layout.data_block_count());
        }
    }

    #[test]
    fn small_layout() {
        let layout = RegionLayout::new(72, 4);
        assert_eq!(layout.first_data_block(), 14);
        assert_eq!(layout.data_block_count(), 58);
        assert!(!layout.is_data_block(13));
        assert!(layout.is_data_block(14));
        assert!(!layout.is_data_block(72));
    }
}
