//! Error types untuk FIFO
//!
//! `put`/`get` tidak pernah gagal (short count bukan error).
//! Error hanya muncul saat konstruksi dan di operasi tambahan
//! yang sifatnya all-or-nothing atau ack manual.

use thiserror::Error;

/// Kapasitas maksimum: jarak antar cursor harus muat di `usize`.
pub const MAX_CAPACITY: usize = 1 << (usize::BITS - 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FifoError {
    /// Kapasitas nol, bukan power of 2, atau lebih dari [`MAX_CAPACITY`]
    #[error("invalid capacity {0}: must be a non-zero power of two no larger than {}", MAX_CAPACITY)]
    InvalidCapacity(usize),

    /// `put_all` butuh lebih banyak ruang kosong dari yang tersedia
    #[error("insufficient space: requested {requested} bytes, {available} free")]
    InsufficientSpace { requested: usize, available: usize },

    /// `get_exact` butuh lebih banyak data dari yang ada di buffer
    #[error("insufficient data: requested {requested} bytes, {available} queued")]
    InsufficientData { requested: usize, available: usize },

    /// `commit`/`release` melebihi region yang boleh di-ack
    #[error("ack out of range: requested {requested} bytes, {available} allowed")]
    AckOutOfRange { requested: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_capacity_is_power_of_two() {
        assert!(MAX_CAPACITY.is_power_of_two());
        assert_eq!(MAX_CAPACITY.wrapping_mul(2), 0);
    }

    #[test]
    fn test_error_messages() {
        let err = FifoError::InsufficientSpace {
            requested: 10,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient space: requested 10 bytes, 3 free"
        );
        assert!(FifoError::InvalidCapacity(6).to_string().contains("6"));
    }
}
