use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
};

use log::debug;

use crate::{
    disk::{
        block_device::BlockDevice,
        types::{Block, BLOCK_SIZE},
    },
    fs::error::FileSystemError,
};

/// 宿主机上的镜像文件。
/// 创建与打开是两个不同的操作：`create` 会截断已有文件，`open` 只读且要求文件已存在。
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    block_count: usize,
}

impl FileDisk {
    /// 创建（或截断）镜像文件，并把长度设为 `block_count` 个块
    pub fn create(path: &Path, block_count: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.set_len((block_count * BLOCK_SIZE) as u64)?;
        debug!("created image file {} ({} blocks)", path.display(), block_count);

        Ok(Self { file, block_count })
    }

    /// 只读打开已有镜像，长度必须正好是 `block_count` 个块
    pub fn open(path: &Path, block_count: usize) -> std::result::Result<Self, FileSystemError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FileSystemError::ImageNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let expected = (block_count * BLOCK_SIZE) as u64;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(FileSystemError::Corrupted(format!(
                "image {} is {} bytes, expected {}",
                path.display(),
                actual,
                expected
            )));
        }

        Ok(Self { file, block_count })
    }

    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()
    }
}

impl BlockDevice for FileDisk {
    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, block_id: u64, buf: &Block) -> Result<()> {
        self.file.seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}
