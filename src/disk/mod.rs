pub mod block_device;
pub mod block_store;
pub mod file_disk;
pub mod types;

pub use block_device::{copy_blocks, BlockDevice};
pub use block_store::BlockStore;
pub use file_disk::FileDisk;
pub use types::{Block, BLOCK_SIZE, NUM_BLOCKS};
