use std::path::PathBuf;

use thiserror::Error;

/// 文件系统错误类型
/// 所有错误都只终止当前这一次操作，调用方（命令循环）可以继续接收下一条命令。
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("Disk image is not open")]
    ImageNotOpen,

    #[error("Disk image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("File of {size} bytes exceeds the maximum file size of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Not enough disk space: need {needed} bytes, {free} bytes free")]
    InsufficientSpace { needed: u64, free: u64 },

    #[error("No free directory entry available")]
    DirectoryExhausted,

    #[error("No free inode available")]
    InodeExhausted,

    #[error("No free data block available")]
    BlocksExhausted,

    #[error("Inode {0} has no free block slot left")]
    FileTooFragmented(u32),

    #[error("Failed to read source file: {0}")]
    SourceReadError(#[source] std::io::Error),

    #[error("Index {index} out of range (limit {limit})")]
    OutOfRange { index: u64, limit: u64 },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File system corrupted: {0}")]
    Corrupted(String),

    // 底层 I/O 错误
    #[error("Disk I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        FileSystemError::Corrupted(format!("record encoding: {}", e))
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
