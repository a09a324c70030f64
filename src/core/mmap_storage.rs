//! Memory-Mapped Storage untuk FIFO
//!
//! Anonymous mmap langsung dari kernel, memungkinkan:
//! - Page-aligned buffer: cocok untuk DMA / O_DIRECT style I/O
//! - Page locking (`mlock`): buffer tidak pernah di-swap out
//! - Alokasi besar tanpa lewat global allocator

use super::storage::Storage;
use memmap2::{MmapMut, MmapOptions};
use std::io;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Mmap-backed storage untuk ring buffer
pub struct MmapStorage {
    // Harus tetap hidup selama `ptr` dipakai
    _mmap: MmapMut,
    ptr: NonNull<u8>,
    len: usize,
    locked: bool,
}

// SAFETY: `ptr` menunjuk ke mapping milik `_mmap` yang Send + Sync.
// Sinkronisasi akses byte diatur oleh cursor FIFO.
unsafe impl Send for MmapStorage {}
unsafe impl Sync for MmapStorage {}

impl MmapStorage {
    /// Membuat anonymous mapping berukuran `capacity` byte.
    ///
    /// # Arguments
    /// * `capacity` - Kapasitas dalam bytes (harus power of 2)
    pub fn anonymous(capacity: usize) -> io::Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("capacity {capacity} must be a non-zero power of 2"),
            ));
        }

        let mut mmap = MmapOptions::new().len(capacity).map_anon()?;
        let ptr = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?;

        debug!(capacity, "anonymous mmap storage created");

        Ok(Self {
            _mmap: mmap,
            ptr,
            len: capacity,
            locked: false,
        })
    }

    /// Sama seperti [`anonymous`](Self::anonymous), lalu coba `mlock`.
    ///
    /// Gagal lock (mis. RLIMIT_MEMLOCK terlalu kecil) bukan fatal:
    /// storage tetap dipakai, hanya di-log sebagai warning.
    pub fn anonymous_locked(capacity: usize) -> io::Result<Self> {
        let mut storage = Self::anonymous(capacity)?;
        if let Err(err) = storage.lock() {
            warn!(capacity, %err, "mlock failed, continuing with pageable memory");
        }
        Ok(storage)
    }

    /// Lock semua page ke RAM
    #[cfg(unix)]
    pub fn lock(&mut self) -> io::Result<()> {
        if self.locked {
            return Ok(());
        }

        // SAFETY: ptr..ptr+len adalah mapping valid milik self
        let rc = unsafe { libc::mlock(self.ptr.as_ptr() as *const libc::c_void, self.len) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        self.locked = true;
        debug!(len = self.len, "mmap storage locked in memory");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn lock(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "page locking is only supported on unix",
        ))
    }

    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

// SAFETY: Mapping tidak pernah di-remap selama MmapStorage hidup.
unsafe impl Storage for MmapStorage {
    #[inline(always)]
    fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmap_storage_basic() {
        let storage = MmapStorage::anonymous(4096).unwrap();
        assert_eq!(storage.len(), 4096);
        assert!(!storage.is_locked());

        unsafe {
            storage.as_mut_ptr().write(7);
            storage.as_mut_ptr().add(4095).write(9);
            assert_eq!(*storage.as_mut_ptr(), 7);
            assert_eq!(*storage.as_mut_ptr().add(4095), 9);
        }
    }

    #[test]
    fn test_mmap_rejects_non_power_of_two() {
        let err = MmapStorage::anonymous(3000).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(MmapStorage::anonymous(0).is_err());
    }

    #[test]
    fn test_mmap_locked_never_fails_on_lock_error() {
        // mlock boleh gagal di CI (RLIMIT_MEMLOCK), konstruksi tetap sukses
        let storage = MmapStorage::anonymous_locked(4096).unwrap();
        assert_eq!(storage.len(), 4096);
    }
}
