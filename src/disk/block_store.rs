use std::{
    fmt,
    io::{self, ErrorKind},
    ops::Range,
};

use crate::{
    disk::{
        block_device::BlockDevice,
        types::{Block, BLOCK_SIZE},
    },
    fs::error::{FileSystemError, Result},
};

/// 整个镜像在内存中的样子：N 个定长块，扁平化存储。
/// 目录、inode 表、位图和数据区都只是其中的一段块区间。
#[derive(Clone, PartialEq, Eq)]
pub struct BlockStore {
    bytes: Vec<u8>,     // 所有块的原始字节
    block_count: usize, // 块总数
}

impl BlockStore {
    /// 创建全零的块数组
    pub fn new(block_count: usize) -> Self {
        Self {
            bytes: vec![0u8; block_count * BLOCK_SIZE],
            block_count,
        }
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.block_count {
            return Err(FileSystemError::OutOfRange {
                index: index as u64,
                limit: self.block_count as u64,
            });
        }
        Ok(())
    }

    pub fn block_at(&self, index: usize) -> Result<&[u8]> {
        self.check(index)?;
        let start = index * BLOCK_SIZE;
        Ok(&self.bytes[start..start + BLOCK_SIZE])
    }

    pub fn block_at_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        self.check(index)?;
        let start = index * BLOCK_SIZE;
        Ok(&mut self.bytes[start..start + BLOCK_SIZE])
    }

    /// 一段连续块区间对应的字节
    pub fn region(&self, blocks: Range<u32>) -> Result<&[u8]> {
        let range = self.byte_range(blocks)?;
        Ok(&self.bytes[range])
    }

    pub fn region_mut(&mut self, blocks: Range<u32>) -> Result<&mut [u8]> {
        let range = self.byte_range(blocks)?;
        Ok(&mut self.bytes[range])
    }

    fn byte_range(&self, blocks: Range<u32>) -> Result<Range<usize>> {
        if blocks.start > blocks.end || blocks.end as usize > self.block_count {
            return Err(FileSystemError::OutOfRange {
                index: blocks.end as u64,
                limit: self.block_count as u64,
            });
        }
        Ok(blocks.start as usize * BLOCK_SIZE..blocks.end as usize * BLOCK_SIZE)
    }
}

impl fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStore")
            .field("block_count", &self.block_count)
            .finish()
    }
}

fn out_of_range(block_id: u64, limit: usize) -> io::Error {
    io::Error::new(
        ErrorKind::InvalidInput,
        format!("block {} out of range ({} blocks)", block_id, limit),
    )
}

impl BlockDevice for BlockStore {
    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&self, block_id: u64, buf: &mut Block) -> io::Result<()> {
        let block = self
            .block_at(block_id as usize)
            .map_err(|_| out_of_range(block_id, self.block_count))?;
        buf.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&mut self, block_id: u64, buf: &Block) -> io::Result<()> {
        let limit = self.block_count;
        let block = self
            .block_at_mut(block_id as usize)
            .map_err(|_| out_of_range(block_id, limit))?;
        block.copy_from_slice(buf);
        Ok(())
    }
}
