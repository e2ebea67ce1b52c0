use std::collections::HashSet;

use crate::{
    disk::BlockStore,
    fs::{
        data_area::DataArea,
        data_block_bitmap::FreeBlockMap,
        directory::Directory,
        error::{FileSystemError, Result},
        ingest::FileIngester,
        inode_bitmap::FreeInodeMap,
        inode_table::InodeTable,
        layout::RegionLayout,
    },
};

/// 一个已打开镜像的全部内容：块数组以及从中解码出的各个结构。
/// 每次修改之后调用 `sync`，块数组始终和结构保持一致。
#[derive(Debug, Clone)]
pub struct Volume {
    pub store: BlockStore,           // 整个镜像
    pub directory: Directory,        // 目录
    pub inodes: InodeTable,          // inode 表
    pub inode_map: FreeInodeMap,     // inode 分配信息
    pub block_map: FreeBlockMap,     // 数据块分配信息
    pub data: DataArea,              // 数据区读写
}

impl Volume {
    /// 全零块数组 + 全部空闲的目录、inode 和位图
    pub fn format(layout: &RegionLayout) -> Result<Self> {
        let mut volume = Self {
            store: BlockStore::new(layout.num_blocks() as usize),
            directory: Directory::new(layout),
            inodes: InodeTable::new(layout),
            inode_map: FreeInodeMap::new(layout),
            block_map: FreeBlockMap::new(layout),
            data: DataArea::new(layout),
        };
        volume.sync()?;
        Ok(volume)
    }

    /// 从块数组解码，并检查目录、inode 和位图之间是否一致
    pub fn load(store: BlockStore, layout: &RegionLayout) -> Result<Self> {
        let volume = Self {
            directory: Directory::load(&store, layout)?,
            inodes: InodeTable::load(&store, layout)?,
            inode_map: FreeInodeMap::load(&store, layout)?,
            block_map: FreeBlockMap::load(&store, layout)?,
            data: DataArea::new(layout),
            store,
        };
        volume.check(layout)?;
        Ok(volume)
    }

    fn check(&self, layout: &RegionLayout) -> Result<()> {
        for (slot, entry) in self.directory.in_use() {
            let inode = entry.inode.unwrap_or(u32::MAX);
            let linked = self.inodes.get(inode).map(|n| n.in_use).unwrap_or(false);
            if !linked || self.inode_map.is_free(inode) {
                return Err(FileSystemError::Corrupted(format!(
                    "directory slot {} points at unused inode {}",
                    slot, inode
                )));
            }
        }

        let mut seen = HashSet::new();
        for (index, inode) in self.inodes.iter().filter(|(_, n)| n.in_use) {
            for block in inode.block_list() {
                if !layout.is_data_block(block) || self.block_map.is_free(block) {
                    return Err(FileSystemError::Corrupted(format!(
                        "inode {} references block {} outside the allocated data region",
                        index, block
                    )));
                }
                if !seen.insert(block) {
                    return Err(FileSystemError::Corrupted(format!(
                        "block {} is shared by more than one inode",
                        block
                    )));
                }
            }
        }

        // 反方向：标记为已用的数据块必须有 inode 引用
        if let Some(block) = layout
            .data_blocks()
            .find(|b| !self.block_map.is_free(*b) && !seen.contains(b))
        {
            return Err(FileSystemError::Corrupted(format!(
                "block {} is marked used but no inode references it",
                block
            )));
        }
        Ok(())
    }

    /// 把改动过的结构写回块数组
    pub fn sync(&mut self) -> Result<()> {
        self.directory.sync(&mut self.store)?;
        self.inodes.sync(&mut self.store)?;
        self.inode_map.sync(&mut self.store)?;
        self.block_map.sync(&mut self.store)?;
        Ok(())
    }

    pub fn ingester(&mut self) -> FileIngester<'_> {
        FileIngester {
            directory: &mut self.directory,
            inodes: &mut self.inodes,
            inode_map: &mut self.inode_map,
            block_map: &mut self.block_map,
            data: &self.data,
            store: &mut self.store,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn formatted_volume_reloads_cleanly() {
        let layout = RegionLayout::new(72, 4);
        let volume = Volume::format(&layout).unwrap();
        let loaded = Volume::load(volume.store.clone(), &layout).unwrap();
        assert_eq!(loaded.block_map.free_bytes(), 58 * 1024);
        assert_eq!(loaded.inode_map.free_count(), 4);
        assert!(loaded.directory.list_files().is_empty());
    }

    fn volume_with_files(layout: &RegionLayout, names: &[&str]) -> Volume {
        let mut volume = Volume::format(layout).unwrap();
        for name in names {
            volume
                .ingester()
                .ingest(name, 10, Cursor::new(vec![0u8; 10]))
                .unwrap();
        }
        volume
    }

    fn assert_corrupted(mut volume: Volume, layout: &RegionLayout) {
        volume.sync().unwrap();
        assert!(matches!(
            Volume::load(volume.store, layout),
            Err(FileSystemError::Corrupted(_))
        ));
    }

    #[test]
    fn unformatted_store_is_rejected() {
        // 全零的镜像：位图全为 0，数据块全部“已用”却没有 inode 引用
        let layout = RegionLayout::new(72, 4);
        assert!(matches!(
            Volume::load(BlockStore::new(72), &layout),
            Err(FileSystemError::Corrupted(_))
        ));
    }

    #[test]
    fn load_detects_directory_entry_with_unused_inode() {
        let layout = RegionLayout::new(72, 4);
        let mut volume = volume_with_files(&layout, &["a"]);
        let block = volume.inodes.get(0).unwrap().block_list().next().unwrap();
        volume.inodes.release(&mut volume.inode_map, 0);
        volume.block_map.release(block);
        assert_corrupted(volume, &layout);
    }

    #[test]
    fn load_detects_block_outside_data_region() {
        let layout = RegionLayout::new(72, 4);
        let mut volume = volume_with_files(&layout, &["a"]);
        // 块 3 属于 inode 表区域
        volume.inodes.get_mut(0).unwrap().blocks[0] = 3;
        volume.block_map.release(14);
        assert_corrupted(volume, &layout);
    }

    #[test]
    fn load_detects_block_shared_by_two_inodes() {
        let layout = RegionLayout::new(72, 4);
        let mut volume = volume_with_files(&layout, &["a", "b"]);
        let first = volume.inodes.get(0).unwrap().blocks[0];
        let second = volume.inodes.get(1).unwrap().blocks[0];
        volume.inodes.get_mut(1).unwrap().blocks[0] = first;
        volume.block_map.release(second as u32);
        assert_corrupted(volume, &layout);
    }

    #[test]
    fn load_detects_used_block_without_owner() {
        let layout = RegionLayout::new(72, 4);
        let mut volume = volume_with_files(&layout, &["a"]);
        volume.block_map.allocate().unwrap();
        assert_corrupted(volume, &layout);
    }

    #[test]
    fn load_detects_block_marked_free_but_referenced() {
        let layout = RegionLayout::new(72, 4);
        let mut volume = Volume::format(&layout).unwrap();
        volume
            .ingester()
            .ingest("a", 10, Cursor::new(vec![0u8; 10]))
            .unwrap();
        volume.block_map.release(14);
        volume.sync().unwrap();

        assert!(matches!(
            Volume::load(volume.store, &layout),
            Err(FileSystemError::Corrupted(_))
        ));
    }
}
