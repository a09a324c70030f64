//! Shim untuk atomics dan Arc: `std` di production, `loom` saat model checking.
//!
//! Aktifkan dengan `--features loom` (lihat `tests/loom_fifo.rs`).

#[cfg(not(feature = "loom"))]
pub(crate) mod atomic {
    pub use std::sync::atomic::{AtomicUsize, Ordering};
}

#[cfg(feature = "loom")]
pub(crate) mod atomic {
    pub use loom::sync::atomic::{AtomicUsize, Ordering};
}

#[cfg(not(feature = "loom"))]
pub(crate) mod sync {
    pub use std::sync::Arc;
}

#[cfg(feature = "loom")]
pub(crate) mod sync {
    pub use loom::sync::Arc;
}

// Hanya untuk causality tracking di ring_buffer.rs; build std tidak butuh
#[cfg(feature = "loom")]
pub(crate) mod cell {
    pub use loom::cell::UnsafeCell;
}
