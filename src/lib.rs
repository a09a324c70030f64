//! kfifo - Lock-Free Power-of-Two Byte FIFO
//!
//! Ring buffer byte dengan kapasitas tetap (power of 2) untuk transfer
//! data producer/consumer, termasuk antar dua thread tanpa lock.
//!
//! ```
//! # #[cfg(not(feature = "loom"))]
//! # fn main() {
//! use kfifo::Fifo;
//!
//! let mut fifo = Fifo::new(8).unwrap();
//!
//! // Lebih dari kapasitas -> short count, sisanya di-drop
//! assert_eq!(fifo.put(b"0123456789"), 8);
//!
//! let mut out = [0u8; 4];
//! assert_eq!(fifo.get(&mut out), 4);
//! assert_eq!(&out, b"0123");
//! # }
//! # #[cfg(feature = "loom")]
//! # fn main() {}
//! ```
//!
//! Untuk dua thread, pecah jadi handle producer dan consumer:
//!
//! ```
//! # #[cfg(not(feature = "loom"))]
//! # fn main() {
//! use std::thread;
//!
//! let (mut producer, mut consumer) = kfifo::split(1024).unwrap();
//!
//! let handle = thread::spawn(move || {
//!     let data = [7u8; 4096];
//!     let mut sent = 0;
//!     while sent < data.len() {
//!         sent += producer.put(&data[sent..]);
//!     }
//! });
//!
//! let mut received = 0;
//! let mut buf = [0u8; 256];
//! while received < 4096 {
//!     received += consumer.get(&mut buf);
//! }
//! handle.join().unwrap();
//! # }
//! # #[cfg(feature = "loom")]
//! # fn main() {}
//! ```

pub mod core;

pub use crate::core::{split, Consumer, Fifo, FifoError, HeapStorage, MmapStorage, Producer, Storage};
