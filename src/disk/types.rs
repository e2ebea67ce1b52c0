/// 每个逻辑块（Block）的大小：1KB
/// 镜像以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 1024;

/// 镜像中包含的块总数：64MB / 1KB = 65536 块
pub const NUM_BLOCKS: usize = 65_536;

/// 定义一个逻辑块类型（每块 1KB 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];
