//! Backing storage untuk FIFO
//!
//! FIFO tidak peduli dari mana byte-nya dialokasikan. Yang penting:
//! alamat stabil, panjang tetap, dan boleh ditulis lewat `&self`
//! (producer dan consumer berbagi storage tanpa lock).

use std::cell::UnsafeCell;

/// Region byte dengan panjang tetap yang bisa di-share antar thread.
///
/// # Safety
/// Implementor harus menjamin:
/// - `as_mut_ptr()` valid untuk `len()` byte selama storage hidup
/// - Alamat tidak berubah (tidak ada realloc / move isi)
/// - Menulis lewat pointer tersebut dari `&self` diperbolehkan
///   (interior mutability), selama region yang ditulis tidak sedang dibaca
pub unsafe trait Storage: Send + Sync {
    /// Panjang region dalam byte
    fn len(&self) -> usize;

    /// Pointer ke byte pertama
    fn as_mut_ptr(&self) -> *mut u8;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage di heap, di-zero saat inisialisasi.
///
/// Alokasi hanya terjadi sekali di sini, tidak ada alokasi di hot path.
pub struct HeapStorage {
    bytes: Box<[UnsafeCell<u8>]>,
}

impl HeapStorage {
    pub fn new(len: usize) -> Self {
        let bytes = (0..len).map(|_| UnsafeCell::new(0u8)).collect();
        Self { bytes }
    }
}

// SAFETY: Akses ke byte yang sama selalu dipisahkan oleh cursor SPSC
// (lihat ring_buffer.rs), jadi tidak ada data race.
unsafe impl Sync for HeapStorage {}

// SAFETY: Box tidak pernah di-realloc; UnsafeCell<u8> punya layout sama dengan u8.
unsafe impl Storage for HeapStorage {
    #[inline(always)]
    fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    fn as_mut_ptr(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.bytes.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_storage_zeroed() {
        let storage = HeapStorage::new(16);
        assert_eq!(storage.len(), 16);
        assert!(!storage.is_empty());

        let bytes = unsafe { std::slice::from_raw_parts(storage.as_mut_ptr(), 16) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_heap_storage_write_through_shared_ref() {
        let storage = HeapStorage::new(4);
        unsafe {
            storage.as_mut_ptr().add(3).write(0xAB);
            assert_eq!(*storage.as_mut_ptr().add(3), 0xAB);
        }
    }
}
