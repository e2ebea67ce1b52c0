use std::ops::Range;

use log::debug;

use crate::{
    disk::{BlockStore, BLOCK_SIZE},
    fs::{
        error::{FileSystemError, Result},
        layout::RegionLayout,
    },
};

const FREE: u8 = 1;
const USED: u8 = 0;

/// 数据块空闲表：数据区中每个块占一个字节，1 表示空闲。
/// 对外的块号都是镜像中的绝对块号（从 first_data_block 开始）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBlockMap {
    slots: Vec<u8>,        // 每个数据块的状态
    first_data_block: u32, // 数据区起始块号
    region: Range<u32>,    // 位图在镜像中的块区间
}

impl FreeBlockMap {
    pub fn new(layout: &RegionLayout) -> Self {
        Self {
            slots: vec![FREE; layout.data_block_count() as usize],
            first_data_block: layout.first_data_block(),
            region: layout.free_block_bitmap_blocks(),
        }
    }

    // 从数据区开头升序查找第一个空闲块，标记为已用并返回块号
    pub fn allocate(&mut self) -> Result<u32> {
        let offset = self
            .slots
            .iter()
            .position(|&s| s == FREE)
            .ok_or(FileSystemError::BlocksExhausted)?;
        self.slots[offset] = USED;
        let block = self.first_data_block + offset as u32;
        debug!("allocated data block {}", block);
        Ok(block)
    }

    // 归还一个数据块，只在插入失败回滚时使用
    pub(crate) fn release(&mut self, block: u32) {
        if let Some(offset) = block.checked_sub(self.first_data_block) {
            if let Some(slot) = self.slots.get_mut(offset as usize) {
                *slot = FREE;
            }
        }
    }

    pub fn is_free(&self, block: u32) -> bool {
        block
            .checked_sub(self.first_data_block)
            .and_then(|offset| self.slots.get(offset as usize))
            == Some(&FREE)
    }

    pub fn free_count(&self) -> u64 {
        self.slots.iter().filter(|&&s| s == FREE).count() as u64
    }

    // 剩余空间 = 空闲块数 * 块大小
    pub fn free_bytes(&self) -> u64 {
        self.free_count() * BLOCK_SIZE as u64
    }

    // 从镜像加载数据块位图
    pub fn load(store: &BlockStore, layout: &RegionLayout) -> Result<Self> {
        let region = layout.free_block_bitmap_blocks();
        let bytes = store.region(region.clone())?;
        let slots = bytes[..layout.data_block_count() as usize].to_vec();
        Ok(Self {
            slots,
            first_data_block: layout.first_data_block(),
            region,
        })
    }

    // 将数据块位图写回镜像，不够一块的用 0 填充
    pub fn sync(&self, store: &mut BlockStore) -> Result<()> {
        let bytes = store.region_mut(self.region.clone())?;
        bytes.fill(0);
        bytes[..self.slots.len()].copy_from_slice(&self.slots);
        Ok(())
    }
}
