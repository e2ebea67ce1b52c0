use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

use log::{debug, warn};

use crate::{
    disk::{BlockStore, BLOCK_SIZE},
    fs::{
        config::MAX_FILE_SIZE,
        data_area::DataArea,
        data_block_bitmap::FreeBlockMap,
        directory::Directory,
        error::{FileSystemError, Result},
        inode_bitmap::FreeInodeMap,
        inode_table::InodeTable,
    },
    utils::{blocks_needed, bounded_filename, filename_of},
};

/// 把外部文件拷进镜像：校验、分配目录项/inode/数据块，再按块拷贝内容。
///
/// 本次插入拿到的目录槽、inode 和数据块都记在 `Staged` 里，
/// 任何一步失败都会把它们全部归还，镜像的元数据回到插入之前的状态。
pub struct FileIngester<'a> {
    pub directory: &'a mut Directory,
    pub inodes: &'a mut InodeTable,
    pub inode_map: &'a mut FreeInodeMap,
    pub block_map: &'a mut FreeBlockMap,
    pub data: &'a DataArea,
    pub store: &'a mut BlockStore,
}

// 一次插入过程中已经占用的资源
#[derive(Debug, Default)]
struct Staged {
    slot: Option<u32>,
    inode: Option<u32>,
    blocks: Vec<u32>,
}

impl FileIngester<'_> {
    /// 插入宿主机上的文件，返回它占用的目录槽号
    pub fn insert_file(&mut self, path: &Path) -> Result<u32> {
        let size = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(FileSystemError::SourceNotFound(path.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FileSystemError::SourceNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(FileSystemError::SourceReadError(e)),
        };
        let name = filename_of(path)?;
        let source = File::open(path).map_err(FileSystemError::SourceReadError)?;
        self.ingest(&name, size, source)
    }

    /// 从任意数据源读取 `size` 字节存为 `name`
    pub fn ingest<R: Read>(&mut self, name: &str, size: u64, mut source: R) -> Result<u32> {
        if size > MAX_FILE_SIZE {
            return Err(FileSystemError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }

        let free = self.block_map.free_bytes();
        if size > free {
            return Err(FileSystemError::InsufficientSpace { needed: size, free });
        }

        let name = bounded_filename(name);
        if self.directory.find(name).is_some() {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }

        let slot = self.directory.find_free_slot()?;

        let mut staged = Staged::default();
        match self.copy_in(&mut staged, slot, name, size, &mut source) {
            Ok(()) => {
                debug!(
                    "inserted {} ({} bytes, {} blocks) at slot {}",
                    name,
                    size,
                    blocks_needed(size),
                    slot
                );
                Ok(slot)
            }
            Err(e) => {
                warn!("insert of {} failed: {}; rolling back", name, e);
                self.rollback(staged);
                Err(e)
            }
        }
    }

    fn copy_in<R: Read>(
        &mut self,
        staged: &mut Staged,
        slot: u32,
        name: &str,
        size: u64,
        source: &mut R,
    ) -> Result<()> {
        // size 已经不超过 MAX_FILE_SIZE
        let inode = self.inodes.allocate(self.inode_map, size as u32)?;
        staged.inode = Some(inode);

        self.directory.occupy(slot, name, inode)?;
        staged.slot = Some(slot);

        let mut buf = [0u8; BLOCK_SIZE];
        let mut remaining = size;
        while remaining > 0 {
            let chunk = remaining.min(BLOCK_SIZE as u64) as usize;
            source
                .read_exact(&mut buf[..chunk])
                .map_err(FileSystemError::SourceReadError)?;

            let block = self.block_map.allocate()?;
            staged.blocks.push(block);
            self.data.write_block(self.store, block, &buf[..chunk])?;
            self.inodes.append_block(inode, block)?;

            remaining -= chunk as u64;
        }
        Ok(())
    }

    fn rollback(&mut self, staged: Staged) {
        for block in staged.blocks {
            self.block_map.release(block);
        }
        if let Some(inode) = staged.inode {
            self.inodes.release(self.inode_map, inode);
        }
        if let Some(slot) = staged.slot {
            self.directory.release(slot);
        }
    }
}
