use std::ops::Range;

use log::debug;

use crate::{
    disk::BlockStore,
    fs::{
        error::{FileSystemError, Result},
        layout::RegionLayout,
    },
};

const FREE: u8 = 1;
const USED: u8 = 0;

/// inode 空闲表：每个 inode 槽占一个字节，1 表示空闲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeInodeMap {
    slots: Vec<u8>,      // 每个 inode 的状态
    region: Range<u32>, // 在镜像中的块区间（用于持久化）
}

impl FreeInodeMap {
    // 创建一个新的 inode 空闲表（全部空闲）
    pub fn new(layout: &RegionLayout) -> Self {
        Self {
            slots: vec![FREE; layout.num_files() as usize],
            region: layout.free_inode_bitmap_blocks(),
        }
    }

    // 分配一个空闲 inode：从 0 开始升序查找第一个空闲槽
    pub fn allocate(&mut self) -> Result<u32> {
        let index = self
            .slots
            .iter()
            .position(|&s| s == FREE)
            .ok_or(FileSystemError::InodeExhausted)?;
        self.slots[index] = USED;
        debug!("allocated inode {}", index);
        Ok(index as u32)
    }

    // 归还一个 inode，只在插入失败回滚时使用
    pub(crate) fn release(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            *slot = FREE;
        }
    }

    pub fn is_free(&self, index: u32) -> bool {
        self.slots.get(index as usize) == Some(&FREE)
    }

    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|&&s| s == FREE).count()
    }

    // 从镜像加载
    pub fn load(store: &BlockStore, layout: &RegionLayout) -> Result<Self> {
        let region = layout.free_inode_bitmap_blocks();
        let bytes = store.region(region.clone())?;
        // 截掉凑整块用的填充字节
        let slots = bytes[..layout.num_files() as usize].to_vec();
        Ok(Self { slots, region })
    }

    // 写回镜像，不足一块的部分补零
    pub fn sync(&self, store: &mut BlockStore) -> Result<()> {
        let bytes = store.region_mut(self.region.clone())?;
        bytes.fill(0);
        bytes[..self.slots.len()].copy_from_slice(&self.slots);
        Ok(())
    }
}
