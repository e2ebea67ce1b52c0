//! 单文件磁盘镜像：扁平目录、inode 表、空闲位图和数据区都打包在一个定长块数组里，
//! 可以整体保存到宿主机文件，也可以从文件整体读回。

pub mod disk;
pub mod fs;
pub mod utils;

pub use fs::{
    error::{FileSystemError, Result},
    inode_table::InodeAttributes,
    layout::RegionLayout,
    FileInfo, FilesystemImage, ImageState,
};
