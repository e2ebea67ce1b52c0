use std::ops::Range;

use crate::{
    disk::{BlockStore, BLOCK_SIZE},
    fs::{
        error::{FileSystemError, Result},
        layout::RegionLayout,
    },
};

/// 数据区的读写入口，只接受数据区内的块号
#[derive(Debug, Clone)]
pub struct DataArea {
    blocks: Range<u32>, // 数据区块区间
}

impl DataArea {
    pub fn new(layout: &RegionLayout) -> Self {
        Self {
            blocks: layout.data_blocks(),
        }
    }

    fn check(&self, block: u32) -> Result<()> {
        if !self.blocks.contains(&block) {
            return Err(FileSystemError::OutOfRange {
                index: block as u64,
                limit: self.blocks.end as u64,
            });
        }
        Ok(())
    }

    /// 整块写入：`buf` 不足一块时剩余部分清零，不留下旧内容
    pub fn write_block(&self, store: &mut BlockStore, block: u32, buf: &[u8]) -> Result<()> {
        self.check(block)?;
        if buf.len() > BLOCK_SIZE {
            return Err(FileSystemError::OutOfRange {
                index: buf.len() as u64,
                limit: BLOCK_SIZE as u64,
            });
        }
        let dest = store.block_at_mut(block as usize)?;
        dest[..buf.len()].copy_from_slice(buf);
        dest[buf.len()..].fill(0);
        Ok(())
    }

    pub fn read_block<'a>(&self, store: &'a BlockStore, block: u32) -> Result<&'a [u8]> {
        self.check(block)?;
        store.block_at(block as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (DataArea, BlockStore) {
        let layout = RegionLayout::new(72, 4);
        (
            DataArea::new(&layout),
            BlockStore::new(layout.num_blocks() as usize),
        )
    }

    #[test]
    fn short_write_clears_rest_of_block() {
        let (data, mut store) = setup();
        data.write_block(&mut store, 20, &[0xFF; BLOCK_SIZE]).unwrap();
        data.write_block(&mut store, 20, b"hello").unwrap();

        let block = data.read_block(&store, 20).unwrap();
        assert_eq!(&block[..5], b"hello");
        assert!(block[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_blocks_outside_data_region() {
        let (data, mut store) = setup();
        assert!(data.write_block(&mut store, 0, b"x").is_err());
        assert!(data.write_block(&mut store, 13, b"x").is_err());
        assert!(data.write_block(&mut store, 72, b"x").is_err());
        assert!(data.read_block(&store, 14).is_ok());
    }

    #[test]
    fn rejects_oversized_buffer() {
        let (data, mut store) = setup();
        assert!(data
            .write_block(&mut store, 14, &[0; BLOCK_SIZE + 1])
            .is_err());
    }
}
