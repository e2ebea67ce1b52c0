use crate::disk::BLOCK_SIZE;

// 目录项与 inode 数量相同，一个文件占一个目录项和一个 inode
pub const NUM_FILES: u32 = 256;

// 每个 inode 最多记录 1024 个块号
pub const BLOCKS_PER_FILE: usize = 1024;

// 单个文件的最大字节数：1024 块 * 1KB = 1MB
pub const MAX_FILE_SIZE: u64 = (BLOCKS_PER_FILE * BLOCK_SIZE) as u64;

// 文件名最长 64 字节，超出部分截断
pub const MAX_FILENAME_LEN: usize = 64;

// 目录项在镜像中占用的固定字节数（bincode 编码后不超过此值，其余补零）
pub const DIR_ENTRY_SIZE: u32 = 84;

// inode 在镜像中占用的固定字节数
pub const INODE_SIZE: u32 = 2816;

// inode 块列表中表示“未分配”的块号。0 号块属于目录区，永远不会是数据块
pub const UNASSIGNED_BLOCK: u16 = 0;
