use std::ops::Range;

use bitflags::bitflags;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockStore, BLOCK_SIZE},
    fs::{
        config::{BLOCKS_PER_FILE, INODE_SIZE, UNASSIGNED_BLOCK},
        error::{FileSystemError, Result},
        inode_bitmap::FreeInodeMap,
        layout::RegionLayout,
    },
};

bitflags! {
    /// inode 属性字节
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InodeAttributes: u8 {
        const HIDDEN = 0b0000_0001; // 默认不在列表中显示
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Inode {
    pub blocks: Vec<u16>, // 块号列表，固定 BLOCKS_PER_FILE 项，未用的为 UNASSIGNED_BLOCK
    pub in_use: bool,     // 是否已被文件占用
    pub attribute: u8,    // InodeAttributes 的原始位
    pub size: u32,        // 文件大小（字节）
}

impl Inode {
    pub fn new(size: u32) -> Self {
        Self {
            blocks: vec![UNASSIGNED_BLOCK; BLOCKS_PER_FILE],
            in_use: true,
            attribute: 0,
            size,
        }
    }

    pub fn empty() -> Self {
        Self {
            blocks: vec![UNASSIGNED_BLOCK; BLOCKS_PER_FILE],
            in_use: false,
            attribute: 0,
            size: 0,
        }
    }

    /// 把块号写进第一个未分配的位置。
    /// 每次都从头扫描，K 个块的文件总代价是 O(K²)，文件块数上限很小所以可以接受。
    /// 列表已满时返回 false。
    pub fn append_block(&mut self, block: u16) -> bool {
        match self.blocks.iter_mut().find(|b| **b == UNASSIGNED_BLOCK) {
            Some(slot) => {
                *slot = block;
                true
            }
            None => false,
        }
    }

    /// 已分配的块号，按写入顺序
    pub fn block_list(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks
            .iter()
            .take_while(|&&b| b != UNASSIGNED_BLOCK)
            .map(|&b| b as u32)
    }

    pub fn block_count(&self) -> usize {
        self.block_list().count()
    }

    pub fn attributes(&self) -> InodeAttributes {
        InodeAttributes::from_bits_truncate(self.attribute)
    }

    pub fn set_attributes(&mut self, attributes: InodeAttributes) {
        self.attribute = attributes.bits();
    }
}

/// inode 表：NUM_FILES 个定长槽，按槽号编码到 inode 区。
#[derive(Debug, Clone)]
pub struct InodeTable {
    inodes: Vec<Inode>,
    dirty: Vec<bool>, // 哪些槽需要写回
    region: Range<u32>,
}

impl InodeTable {
    pub fn new(layout: &RegionLayout) -> Self {
        let count = layout.num_files() as usize;
        Self {
            inodes: vec![Inode::empty(); count],
            dirty: vec![true; count],
            region: layout.inode_blocks(),
        }
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    /// 通过空闲表分配一个 inode，记录文件大小并标记为占用
    pub fn allocate(&mut self, inode_map: &mut FreeInodeMap, size: u32) -> Result<u32> {
        let index = inode_map.allocate()?;
        let slot = self.get_mut(index)?;
        *slot = Inode::new(size);
        Ok(index)
    }

    pub fn append_block(&mut self, index: u32, block: u32) -> Result<()> {
        let block = u16::try_from(block).map_err(|_| FileSystemError::OutOfRange {
            index: block as u64,
            limit: u16::MAX as u64 + 1,
        })?;
        let inode = self.get_mut(index)?;
        if !inode.append_block(block) {
            return Err(FileSystemError::FileTooFragmented(index));
        }
        Ok(())
    }

    // 清空 inode 并归还给空闲表，只在插入失败回滚时使用
    pub(crate) fn release(&mut self, inode_map: &mut FreeInodeMap, index: u32) {
        if let Ok(slot) = self.get_mut(index) {
            *slot = Inode::empty();
        }
        inode_map.release(index);
        debug!("released inode {}", index);
    }

    pub fn get(&self, index: u32) -> Result<&Inode> {
        self.inodes
            .get(index as usize)
            .ok_or(FileSystemError::OutOfRange {
                index: index as u64,
                limit: self.inodes.len() as u64,
            })
    }

    /// 取可变引用并把该槽标记为待写回
    pub fn get_mut(&mut self, index: u32) -> Result<&mut Inode> {
        let limit = self.inodes.len() as u64;
        match self.inodes.get_mut(index as usize) {
            Some(inode) => {
                self.dirty[index as usize] = true;
                Ok(inode)
            }
            None => Err(FileSystemError::OutOfRange {
                index: index as u64,
                limit,
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Inode)> {
        self.inodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    pub fn load(store: &BlockStore, layout: &RegionLayout) -> Result<Self> {
        let region = layout.inode_blocks();
        let bytes = store.region(region.clone())?;
        let count = layout.num_files() as usize;

        let mut inodes = Vec::with_capacity(count);
        for record in bytes.chunks_exact(INODE_SIZE as usize).take(count) {
            let mut inode: Inode = bincode::deserialize(record)?;
            if inode.blocks.len() > BLOCKS_PER_FILE {
                return Err(FileSystemError::Corrupted(format!(
                    "inode {} lists {} blocks",
                    inodes.len(),
                    inode.blocks.len()
                )));
            }
            // 全零的槽解码出来是空列表
            inode.blocks.resize(BLOCKS_PER_FILE, UNASSIGNED_BLOCK);
            if inode.in_use && inode.block_count() != (inode.size as usize).div_ceil(BLOCK_SIZE) {
                return Err(FileSystemError::Corrupted(format!(
                    "inode {} holds {} blocks for {} bytes",
                    inodes.len(),
                    inode.block_count(),
                    inode.size
                )));
            }
            inodes.push(inode);
        }

        Ok(Self {
            inodes,
            dirty: vec![false; count],
            region,
        })
    }

    /// 只把改动过的槽重新编码写回镜像
    pub fn sync(&mut self, store: &mut BlockStore) -> Result<()> {
        let bytes = store.region_mut(self.region.clone())?;
        for (index, inode) in self.inodes.iter().enumerate() {
            if !self.dirty[index] {
                continue;
            }
            let start = index * INODE_SIZE as usize;
            let mut record = &mut bytes[start..start + INODE_SIZE as usize];
            record.fill(0);
            bincode::serialize_into(&mut record, inode)?;
        }
        self.dirty.fill(false);
        Ok(())
    }
}
