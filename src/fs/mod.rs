use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    disk::{copy_blocks, BlockStore, FileDisk},
    fs::{
        directory::FileListing,
        error::{FileSystemError, Result},
        inode_table::InodeAttributes,
        layout::RegionLayout,
        volume::Volume,
    },
};

pub mod config;
pub mod data_area;
pub mod data_block_bitmap;
pub mod directory;
pub mod error;
pub mod ingest;
pub mod inode_bitmap;
pub mod inode_table;
pub mod layout;
pub mod volume;

/// 镜像当前所处的阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageState {
    Closed,
    Created { path: PathBuf }, // 由 create_image 新建
    Opened { path: PathBuf },  // 由 load_image 从已有文件读入
}

/// 镜像中一个文件的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub slot: u32,
    pub inode: u32,
    pub size: u64,
    pub blocks: Vec<u32>,
    pub attributes: InodeAttributes,
}

/// 单文件磁盘镜像。同一时间只有一个镜像处于打开状态，
/// 所有操作同步执行，调用方持有它并按引用传给每个操作。
#[derive(Debug)]
pub struct FilesystemImage {
    layout: RegionLayout,
    state: ImageState,
    volume: Option<Volume>, // 打开时才有
    unsaved: bool,          // 是否有未保存的修改
}

impl Default for FilesystemImage {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemImage {
    pub fn new() -> Self {
        Self::with_layout(RegionLayout::STANDARD)
    }

    pub fn with_layout(layout: RegionLayout) -> Self {
        Self {
            layout,
            state: ImageState::Closed,
            volume: None,
            unsaved: false,
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn state(&self) -> &ImageState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.volume.is_some()
    }

    /// 当前镜像对应的宿主机文件
    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            ImageState::Closed => None,
            ImageState::Created { path } | ImageState::Opened { path } => Some(path),
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.is_open() && self.unsaved
    }

    fn volume(&self) -> Result<&Volume> {
        self.volume.as_ref().ok_or(FileSystemError::ImageNotOpen)
    }

    fn volume_mut(&mut self) -> Result<&mut Volume> {
        self.volume.as_mut().ok_or(FileSystemError::ImageNotOpen)
    }

    pub fn block_store(&self) -> Result<&BlockStore> {
        Ok(&self.volume()?.store)
    }

    /// 新建（或截断）宿主机文件，写入一个格式化好的空镜像并设为当前镜像
    pub fn create_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let volume = Volume::format(&self.layout)?;
        write_image(&volume.store, path)?;

        info!(
            "created image {} ({} blocks, {} bytes free)",
            path.display(),
            self.layout.num_blocks(),
            volume.block_map.free_bytes()
        );
        self.volume = Some(volume);
        self.state = ImageState::Created {
            path: path.to_path_buf(),
        };
        self.unsaved = false;
        Ok(())
    }

    /// 把整个块数组原样写回当前镜像文件
    pub fn save_image(&mut self) -> Result<()> {
        let path = self
            .path()
            .ok_or(FileSystemError::ImageNotOpen)?
            .to_path_buf();
        let volume = self.volume_mut()?;
        volume.sync()?;
        write_image(&volume.store, &path)?;

        info!("saved image {}", path.display());
        self.unsaved = false;
        Ok(())
    }

    /// 从已有文件读入镜像。文件不存在时报错，不会创建或截断它；
    /// 读取或校验失败时，原来打开的镜像保持不变。
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let disk = FileDisk::open(path, self.layout.num_blocks() as usize)?;
        let mut store = BlockStore::new(self.layout.num_blocks() as usize);
        copy_blocks(&disk, &mut store, self.layout.num_blocks() as usize)?;
        let volume = Volume::load(store, &self.layout)?;

        info!(
            "opened image {} ({} files, {} bytes free)",
            path.display(),
            volume.directory.list_files().len(),
            volume.block_map.free_bytes()
        );
        self.volume = Some(volume);
        self.state = ImageState::Opened {
            path: path.to_path_buf(),
        };
        self.unsaved = false;
        Ok(())
    }

    /// 关闭当前镜像，不会自动保存
    pub fn close_image(&mut self) -> Result<()> {
        if self.volume.take().is_none() {
            return Err(FileSystemError::ImageNotOpen);
        }
        if let Some(path) = self.path() {
            info!("closed image {}", path.display());
        }
        self.state = ImageState::Closed;
        self.unsaved = false;
        Ok(())
    }

    /// 按创建顺序列出所有文件名
    pub fn list_files(&self) -> Result<FileListing<'_>> {
        Ok(self.volume()?.directory.list_files())
    }

    /// 剩余空间（字节）
    pub fn free_space(&self) -> Result<u64> {
        Ok(self.volume()?.block_map.free_bytes())
    }

    /// 把宿主机上的文件拷进镜像
    pub fn insert_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let volume = self.volume_mut()?;
        let result = volume.ingester().insert_file(path.as_ref());
        // 失败时回滚也改动过结构，同样需要写回
        volume.sync()?;
        result?;
        self.unsaved = true;
        Ok(())
    }

    pub fn file_info(&self, name: &str) -> Result<FileInfo> {
        let volume = self.volume()?;
        let (slot, _) = volume
            .directory
            .find(name)
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;
        describe(volume, slot)
    }

    /// 所有文件的信息，按槽号升序
    pub fn entries(&self) -> Result<Vec<FileInfo>> {
        let volume = self.volume()?;
        volume
            .directory
            .in_use()
            .map(|(slot, _)| describe(volume, slot))
            .collect()
    }

    /// 读出文件的完整内容
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let info = self.file_info(name)?;
        let volume = self.volume()?;

        let mut content = Vec::with_capacity(info.size as usize);
        for block in &info.blocks {
            let bytes = volume.data.read_block(&volume.store, *block)?;
            let take = (info.size as usize - content.len()).min(bytes.len());
            content.extend_from_slice(&bytes[..take]);
        }
        Ok(content)
    }

    /// 把镜像中的文件拷到宿主机，返回写出的字节数
    pub fn retrieve_file(&self, name: &str, dest: impl AsRef<Path>) -> Result<u64> {
        let content = self.read_file(name)?;
        let mut file = File::create(dest.as_ref())?;
        file.write_all(&content)?;
        debug!("retrieved {} -> {}", name, dest.as_ref().display());
        Ok(content.len() as u64)
    }

    /// 打开或清除文件的属性位
    pub fn set_attribute(
        &mut self,
        name: &str,
        attributes: InodeAttributes,
        enabled: bool,
    ) -> Result<()> {
        let volume = self.volume_mut()?;
        let inode_index = volume
            .directory
            .find(name)
            .and_then(|(_, e)| e.inode)
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        let inode = volume.inodes.get_mut(inode_index)?;
        let mut current = inode.attributes();
        current.set(attributes, enabled);
        inode.set_attributes(current);
        volume.sync()?;

        self.unsaved = true;
        Ok(())
    }
}

fn describe(volume: &Volume, slot: u32) -> Result<FileInfo> {
    let entry = volume.directory.get(slot)?;
    let inode_index = entry
        .inode
        .ok_or_else(|| FileSystemError::Corrupted(format!("slot {} has no inode", slot)))?;
    let inode = volume.inodes.get(inode_index)?;
    Ok(FileInfo {
        name: entry.filename.clone(),
        slot,
        inode: inode_index,
        size: inode.size as u64,
        blocks: inode.block_list().collect(),
        attributes: inode.attributes(),
    })
}

// 先写到同目录下的临时文件，写完再改名覆盖，失败时原文件保持不变
fn write_image(store: &BlockStore, path: &Path) -> Result<()> {
    let staging = staging_path(path);
    let written = FileDisk::create(&staging, store.block_count())
        .and_then(|mut disk| {
            copy_blocks(store, &mut disk, store.block_count())?;
            disk.sync_all()
        })
        .and_then(|_| std::fs::rename(&staging, path));

    if let Err(err) = written {
        let _ = std::fs::remove_file(&staging);
        return Err(err.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
