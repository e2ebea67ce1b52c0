use std::ops::Range;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::BlockStore,
    fs::{
        config::{DIR_ENTRY_SIZE, MAX_FILENAME_LEN},
        error::{FileSystemError, Result},
        layout::RegionLayout,
    },
    utils::bounded_filename,
};

// 一个目录项，槽号就是它的标识
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct DirEntry {
    pub filename: String,   // 文件名，不超过 MAX_FILENAME_LEN 字节
    pub in_use: bool,       // 是否占用
    pub inode: Option<u32>, // 指向的 inode
}

// 扁平目录：NUM_FILES 个定长槽
#[derive(Debug, Clone)]
pub struct Directory {
    entries: Vec<DirEntry>,
    dirty: Vec<bool>,
    region: Range<u32>,
}

impl Directory {
    pub fn new(layout: &RegionLayout) -> Self {
        let count = layout.num_files() as usize;
        Self {
            entries: vec![DirEntry::default(); count],
            dirty: vec![true; count],
            region: layout.directory_blocks(),
        }
    }

    /// 从 0 开始升序查找第一个空闲槽
    pub fn find_free_slot(&self) -> Result<u32> {
        self.entries
            .iter()
            .position(|e| !e.in_use)
            .map(|i| i as u32)
            .ok_or(FileSystemError::DirectoryExhausted)
    }

    /// 占用槽位，记录（截断后的）文件名并链接 inode
    pub fn occupy(&mut self, slot: u32, filename: &str, inode: u32) -> Result<()> {
        let entry = self.get_mut(slot)?;
        *entry = DirEntry {
            filename: bounded_filename(filename).to_string(),
            in_use: true,
            inode: Some(inode),
        };
        debug!("directory slot {} -> inode {} ({})", slot, inode, filename);
        Ok(())
    }

    // 插入失败回滚时清空槽位
    pub(crate) fn release(&mut self, slot: u32) {
        if let Ok(entry) = self.get_mut(slot) {
            *entry = DirEntry::default();
        }
    }

    // 查找已占用的目录项，返回槽号
    pub fn find(&self, name: &str) -> Option<(u32, &DirEntry)> {
        let name = bounded_filename(name);
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.in_use && e.filename == name)
            .map(|(i, e)| (i as u32, e))
    }

    pub fn get(&self, slot: u32) -> Result<&DirEntry> {
        self.entries.get(slot as usize).ok_or(FileSystemError::OutOfRange {
            index: slot as u64,
            limit: self.entries.len() as u64,
        })
    }

    fn get_mut(&mut self, slot: u32) -> Result<&mut DirEntry> {
        let limit = self.entries.len() as u64;
        match self.entries.get_mut(slot as usize) {
            Some(entry) => {
                self.dirty[slot as usize] = true;
                Ok(entry)
            }
            None => Err(FileSystemError::OutOfRange {
                index: slot as u64,
                limit,
            }),
        }
    }

    /// 所有已占用的目录项，按槽号升序
    pub fn in_use(&self) -> impl Iterator<Item = (u32, &DirEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.in_use)
            .map(|(i, e)| (i as u32, e))
    }

    /// 按槽号升序列出文件名。
    /// 分配总是取最小的空闲槽，所以这个顺序也就是创建顺序。
    pub fn list_files(&self) -> FileListing<'_> {
        FileListing {
            entries: self.entries.iter(),
            remaining: self.entries.iter().filter(|e| e.in_use).count(),
        }
    }

    pub fn load(store: &BlockStore, layout: &RegionLayout) -> Result<Self> {
        let region = layout.directory_blocks();
        let bytes = store.region(region.clone())?;
        let count = layout.num_files() as usize;

        let mut entries = Vec::with_capacity(count);
        for record in bytes.chunks_exact(DIR_ENTRY_SIZE as usize).take(count) {
            let entry: DirEntry = bincode::deserialize(record)?;
            if entry.filename.len() > MAX_FILENAME_LEN {
                return Err(FileSystemError::Corrupted(format!(
                    "directory slot {} has a {} byte name",
                    entries.len(),
                    entry.filename.len()
                )));
            }
            if entry.in_use && entry.inode.is_none() {
                return Err(FileSystemError::Corrupted(format!(
                    "directory slot {} has no inode",
                    entries.len()
                )));
            }
            entries.push(entry);
        }

        Ok(Self {
            entries,
            dirty: vec![false; count],
            region,
        })
    }

    pub fn sync(&mut self, store: &mut BlockStore) -> Result<()> {
        let bytes = store.region_mut(self.region.clone())?;
        for (slot, entry) in self.entries.iter().enumerate() {
            if !self.dirty[slot] {
                continue;
            }
            let start = slot * DIR_ENTRY_SIZE as usize;
            let mut record = &mut bytes[start..start + DIR_ENTRY_SIZE as usize];
            record.fill(0);
            bincode::serialize_into(&mut record, entry)?;
        }
        self.dirty.fill(false);
        Ok(())
    }
}

/// `list_files` 的结果。没有任何文件时 `is_empty()` 为真，由调用方输出提示。
#[derive(Debug, Clone)]
pub struct FileListing<'a> {
    entries: std::slice::Iter<'a, DirEntry>,
    remaining: usize,
}

impl FileListing<'_> {
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

impl<'a> Iterator for FileListing<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.by_ref().find(|e| e.in_use)?;
        self.remaining -= 1;
        Some(entry.filename.as_str())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for FileListing<'_> {}
