use std::path::Path;

use crate::{
    disk::BLOCK_SIZE,
    fs::{
        config::MAX_FILENAME_LEN,
        error::{FileSystemError, Result},
    },
};

/// 存放 `size` 字节需要的块数
pub fn blocks_needed(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}

/// 截断到 MAX_FILENAME_LEN 字节以内，不切断 UTF-8 字符
pub fn bounded_filename(name: &str) -> &str {
    if name.len() <= MAX_FILENAME_LEN {
        return name;
    }
    let mut end = MAX_FILENAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// 取宿主机路径的最后一段作为镜像内的文件名
pub fn filename_of(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| FileSystemError::InvalidFileName(path.display().to_string()))?;
    Ok(bounded_filename(name).to_string())
}
