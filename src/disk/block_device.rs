use std::io::Result;

use crate::disk::types::{Block, BLOCK_SIZE};

/// 按块号读写的设备。内存中的 BlockStore 和宿主机上的镜像文件都实现它，
/// 镜像的保存与加载就是在两者之间逐块拷贝。
pub trait BlockDevice {
    fn block_count(&self) -> usize;
    fn read_block(&self, block_id: u64, buf: &mut Block) -> Result<()>;
    fn write_block(&mut self, block_id: u64, buf: &Block) -> Result<()>;
}

/// 把 `src` 的前 `count` 个块原样拷贝到 `dst`
pub fn copy_blocks<S, D>(src: &S, dst: &mut D, count: usize) -> Result<()>
where
    S: BlockDevice + ?Sized,
    D: BlockDevice + ?Sized,
{
    let mut buf: Block = [0; BLOCK_SIZE];
    for id in 0..count as u64 {
        src.read_block(id, &mut buf)?;
        dst.write_block(id, &buf)?;
    }
    Ok(())
}
