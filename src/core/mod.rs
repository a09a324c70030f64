//! Core module: Lock-Free Byte FIFO dengan pluggable storage
//!
//! Prinsip desain:
//! - Lock-Free: Hanya atomic operations, tidak ada Mutex/RwLock
//! - No-Allocation: Storage pre-allocated saat init, tidak pernah resize
//! - Short Count: `put`/`get` tidak pernah gagal, hanya mengembalikan jumlah byte

mod error;
mod mmap_storage;
mod ring_buffer;
mod shim;
mod storage;

pub use error::{FifoError, MAX_CAPACITY};
pub use mmap_storage::MmapStorage;
pub use ring_buffer::{
    mask_index, round_capacity, split, split_at_wrap, validate_capacity, Consumer, Fifo, Producer,
};
pub use storage::{HeapStorage, Storage};
