//! Lock-Free Single-Producer Single-Consumer (SPSC) Byte FIFO
//!
//! Implementasi kfifo: dua cursor yang naik terus (wrapping) dan storage
//! berukuran power of 2. Posisi fisik = `cursor & (capacity - 1)`.
//! Tidak ada Mutex, tidak ada alokasi setelah inisialisasi.
//!
//! Memory ordering (simetris di kedua sisi):
//! - Producer: copy data -> store `write` (Release). Consumer load `write`
//!   (Acquire) sebelum membaca byte, jadi tidak pernah melihat cursor baru
//!   sebelum datanya ada.
//! - Consumer: copy data keluar -> store `read` (Release). Producer load
//!   `read` (Acquire) sebelum menulis, jadi tidak pernah menimpa byte yang
//!   belum selesai dibaca.

use super::error::{FifoError, MAX_CAPACITY};
use super::shim::atomic::{AtomicUsize, Ordering};
use super::shim::sync::Arc;
use super::storage::{HeapStorage, Storage};
use std::fmt;
use std::io;
use std::ptr;
use tracing::debug;

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Offset fisik di storage untuk cursor logis.
///
/// Sama dengan `cursor % capacity` hanya karena capacity power of 2.
#[inline(always)]
pub const fn mask_index(cursor: usize, capacity: usize) -> usize {
    cursor & (capacity - 1)
}

/// Pecah transfer `len` byte mulai dari `offset` menjadi dua segmen:
/// `(offset..capacity, 0..sisa)`. Segmen kedua nol kalau tidak wrap.
#[inline(always)]
pub const fn split_at_wrap(offset: usize, len: usize, capacity: usize) -> (usize, usize) {
    let room = capacity - offset;
    let first = if len < room { len } else { room };
    (first, len - first)
}

/// Validasi kapasitas: non-zero, power of 2, maksimal [`MAX_CAPACITY`].
pub fn validate_capacity(capacity: usize) -> Result<usize, FifoError> {
    if capacity == 0 || !capacity.is_power_of_two() || capacity > MAX_CAPACITY {
        return Err(FifoError::InvalidCapacity(capacity));
    }
    Ok(capacity)
}

/// Bulatkan ke atas ke power of 2 berikutnya (0 -> 1).
pub fn round_capacity(requested: usize) -> Result<usize, FifoError> {
    requested
        .max(1)
        .checked_next_power_of_two()
        .ok_or(FifoError::InvalidCapacity(requested))
        .and_then(validate_capacity)
}

/// Pelacak akses byte untuk loom.
///
/// Setiap byte storage dipasangkan dengan satu `loom::cell::UnsafeCell`.
/// Tulis lewat `with_mut`, baca lewat `with`: loom panic kalau dua akses ke
/// byte yang sama tidak di-order oleh cursor (Release/Acquire).
#[cfg(feature = "loom")]
struct AccessTracker {
    cells: Box<[super::shim::cell::UnsafeCell<()>]>,
}

#[cfg(feature = "loom")]
impl AccessTracker {
    fn new(len: usize) -> Self {
        let cells = (0..len)
            .map(|_| super::shim::cell::UnsafeCell::new(()))
            .collect();
        Self { cells }
    }

    fn write(&self, offset: usize, len: usize) {
        for cell in &self.cells[offset..offset + len] {
            cell.with_mut(|_| ());
        }
    }

    fn read(&self, offset: usize, len: usize) {
        for cell in &self.cells[offset..offset + len] {
            cell.with(|_| ());
        }
    }
}

// SAFETY: Cell hanya dipakai untuk causality tracking, tidak ada data di dalamnya.
#[cfg(feature = "loom")]
unsafe impl Send for AccessTracker {}
#[cfg(feature = "loom")]
unsafe impl Sync for AccessTracker {}

/// State yang di-share producer dan consumer.
///
/// `write` hanya di-store oleh producer, `read` hanya oleh consumer.
/// Keduanya terpisah cache line untuk menghindari false sharing.
#[repr(C)]
struct Shared<S> {
    write: CacheLinePadded<AtomicUsize>,
    read: CacheLinePadded<AtomicUsize>,
    storage: S,
    mask: usize,
    #[cfg(feature = "loom")]
    access: AccessTracker,
}

impl<S: Storage> Shared<S> {
    fn new(storage: S) -> Result<Self, FifoError> {
        let capacity = validate_capacity(storage.len())?;
        Ok(Self {
            write: CacheLinePadded::new(AtomicUsize::new(0)),
            read: CacheLinePadded::new(AtomicUsize::new(0)),
            storage,
            mask: capacity - 1,
            #[cfg(feature = "loom")]
            access: AccessTracker::new(capacity),
        })
    }

    #[inline(always)]
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline(always)]
    fn track_write(&self, offset: usize, len: usize) {
        #[cfg(feature = "loom")]
        self.access.write(offset, len);
        #[cfg(not(feature = "loom"))]
        let _ = (offset, len);
    }

    #[inline(always)]
    fn track_read(&self, offset: usize, len: usize) {
        #[cfg(feature = "loom")]
        self.access.read(offset, len);
        #[cfg(not(feature = "loom"))]
        let _ = (offset, len);
    }

    #[inline(always)]
    fn len(&self) -> usize {
        let write = self.write.value.load(Ordering::Acquire);
        let read = self.read.value.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Copy `src` ke storage mulai dari cursor `start`, wrap ke offset 0.
    ///
    /// # Safety
    /// - `src.len()` <= ruang kosong saat ini
    /// - Hanya producer yang boleh memanggil
    #[inline(always)]
    unsafe fn copy_in(&self, start: usize, src: &[u8]) {
        let capacity = self.capacity();
        let offset = mask_index(start, capacity);
        let (first, second) = split_at_wrap(offset, src.len(), capacity);
        let base = self.storage.as_mut_ptr();
        self.track_write(offset, first);
        self.track_write(0, second);

        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), base.add(offset), first);
            ptr::copy_nonoverlapping(src.as_ptr().add(first), base, second);
        }
    }

    /// Copy dari storage mulai cursor `start` ke `dst`, wrap ke offset 0.
    ///
    /// # Safety
    /// - `dst.len()` <= jumlah byte yang sudah di-publish producer
    /// - Hanya consumer yang boleh memanggil
    #[inline(always)]
    unsafe fn copy_out(&self, start: usize, dst: &mut [u8]) {
        let capacity = self.capacity();
        let offset = mask_index(start, capacity);
        let (first, second) = split_at_wrap(offset, dst.len(), capacity);
        let base = self.storage.as_mut_ptr();
        self.track_read(offset, first);
        self.track_read(0, second);

        unsafe {
            ptr::copy_nonoverlapping(base.add(offset), dst.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), second);
        }
    }
}

/// Producer half: satu-satunya yang boleh memajukan write cursor.
pub struct Producer<S: Storage = HeapStorage> {
    shared: Arc<Shared<S>>,
}

/// Consumer half: satu-satunya yang boleh memajukan read cursor.
pub struct Consumer<S: Storage = HeapStorage> {
    shared: Arc<Shared<S>>,
}

impl<S: Storage> Producer<S> {
    /// Snapshot `(write, free)` dari sisi producer.
    #[inline(always)]
    fn free_space(&self) -> (usize, usize) {
        let write = self.shared.write.value.load(Ordering::Relaxed);
        // Acquire: semua copy_out consumer sebelum store `read` sudah selesai
        let read = self.shared.read.value.load(Ordering::Acquire);
        (write, self.shared.capacity() - write.wrapping_sub(read))
    }

    #[inline(always)]
    fn publish(&self, write: usize, len: usize) {
        // Release: byte yang baru di-copy visible sebelum cursor baru
        self.shared
            .write
            .value
            .store(write.wrapping_add(len), Ordering::Release);
    }

    /// Kapasitas buffer
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Jumlah byte yang sedang antri
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Cek apakah buffer kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ruang kosong dalam byte
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.free_space().1
    }

    /// Cek apakah buffer penuh
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.available() == 0
    }

    /// Copy sebanyak mungkin byte dari `src` ke FIFO.
    ///
    /// Returns jumlah byte yang benar-benar masuk: `min(src.len(), available)`.
    /// Sisanya di-drop; short count adalah satu-satunya sinyal back-pressure.
    #[inline(always)]
    pub fn put(&mut self, src: &[u8]) -> usize {
        let (write, free) = self.free_space();
        let len = src.len().min(free);
        if len == 0 {
            return 0;
        }

        // SAFETY: len <= free, dan &mut self menjamin producer tunggal
        unsafe {
            self.shared.copy_in(write, &src[..len]);
        }
        self.publish(write, len);

        len
    }

    /// All-or-nothing: masukkan seluruh `src` atau tidak sama sekali.
    pub fn put_all(&mut self, src: &[u8]) -> Result<(), FifoError> {
        let (write, free) = self.free_space();
        if src.len() > free {
            return Err(FifoError::InsufficientSpace {
                requested: src.len(),
                available: free,
            });
        }
        if src.is_empty() {
            return Ok(());
        }

        // SAFETY: src.len() <= free
        unsafe {
            self.shared.copy_in(write, src);
        }
        self.publish(write, src.len());

        Ok(())
    }

    /// Region kosong contiguous terbesar mulai dari write cursor.
    ///
    /// Untuk zero-copy I/O: isi slice ini langsung (mis. dari socket),
    /// lalu panggil [`commit`](Self::commit) dengan jumlah byte yang ditulis.
    /// Slice kosong berarti FIFO penuh.
    pub fn write_chunk(&mut self) -> &mut [u8] {
        let (write, free) = self.free_space();
        let capacity = self.shared.capacity();
        let offset = mask_index(write, capacity);
        let len = free.min(capacity - offset);
        self.shared.track_write(offset, len);

        // SAFETY: offset..offset+len ada di dalam storage dan berada di region
        // milik producer; &mut self mencegah commit selama slice hidup
        unsafe { std::slice::from_raw_parts_mut(self.shared.storage.as_mut_ptr().add(offset), len) }
    }

    /// Publish `len` byte yang sudah ditulis lewat [`write_chunk`](Self::write_chunk).
    pub fn commit(&mut self, len: usize) -> Result<(), FifoError> {
        let (write, free) = self.free_space();
        let capacity = self.shared.capacity();
        let contiguous = free.min(capacity - mask_index(write, capacity));
        if len > contiguous {
            return Err(FifoError::AckOutOfRange {
                requested: len,
                available: contiguous,
            });
        }
        if len > 0 {
            self.publish(write, len);
        }
        Ok(())
    }
}

impl<S: Storage> Consumer<S> {
    /// Snapshot `(read, queued)` dari sisi consumer.
    #[inline(always)]
    fn queued(&self) -> (usize, usize) {
        let read = self.shared.read.value.load(Ordering::Relaxed);
        // Acquire: byte sebelum store `write` producer sudah visible
        let write = self.shared.write.value.load(Ordering::Acquire);
        (read, write.wrapping_sub(read))
    }

    #[inline(always)]
    fn advance(&self, read: usize, len: usize) {
        // Release: copy_out di atas selesai sebelum producer melihat ruang kosong
        self.shared
            .read
            .value
            .store(read.wrapping_add(len), Ordering::Release);
    }

    /// Kapasitas buffer
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Jumlah byte yang sedang antri
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queued().1
    }

    /// Cek apakah buffer kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ruang kosong dalam byte
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.capacity() - self.shared.len()
    }

    /// Cek apakah buffer penuh
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Copy sebanyak mungkin byte dari FIFO ke `dst`.
    ///
    /// Returns `min(dst.len(), len())`. Kalau kosong, `dst` tidak disentuh.
    #[inline(always)]
    pub fn get(&mut self, dst: &mut [u8]) -> usize {
        let (read, queued) = self.queued();
        let len = dst.len().min(queued);
        if len == 0 {
            return 0;
        }

        // SAFETY: len <= queued, dan &mut self menjamin consumer tunggal
        unsafe {
            self.shared.copy_out(read, &mut dst[..len]);
        }
        self.advance(read, len);

        len
    }

    /// All-or-nothing: isi seluruh `dst` atau tidak sama sekali.
    pub fn get_exact(&mut self, dst: &mut [u8]) -> Result<(), FifoError> {
        let (read, queued) = self.queued();
        if dst.len() > queued {
            return Err(FifoError::InsufficientData {
                requested: dst.len(),
                available: queued,
            });
        }
        if dst.is_empty() {
            return Ok(());
        }

        // SAFETY: dst.len() <= queued
        unsafe {
            self.shared.copy_out(read, dst);
        }
        self.advance(read, dst.len());

        Ok(())
    }

    /// Seperti `get` tapi read cursor tidak maju.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let (read, queued) = self.queued();
        let len = dst.len().min(queued);

        // SAFETY: len <= queued; producer tidak menyentuh region ini
        // sampai read cursor maju, dan hanya consumer yang bisa memajukannya
        unsafe {
            self.shared.copy_out(read, &mut dst[..len]);
        }

        len
    }

    /// Region terisi contiguous terbesar mulai dari read cursor.
    ///
    /// Untuk zero-copy I/O: kirim slice ini langsung, lalu panggil
    /// [`release`](Self::release) dengan jumlah byte yang terkirim.
    pub fn read_chunk(&self) -> &[u8] {
        let (read, queued) = self.queued();
        let capacity = self.shared.capacity();
        let offset = mask_index(read, capacity);
        let len = queued.min(capacity - offset);
        self.shared.track_read(offset, len);

        // SAFETY: byte di region ini sudah di-publish dan tidak akan ditimpa
        // selama read cursor belum maju (butuh &mut self)
        unsafe { std::slice::from_raw_parts(self.shared.storage.as_mut_ptr().add(offset), len) }
    }

    /// Bebaskan `len` byte dari depan FIFO tanpa copy.
    pub fn release(&mut self, len: usize) -> Result<(), FifoError> {
        let (read, queued) = self.queued();
        if len > queued {
            return Err(FifoError::AckOutOfRange {
                requested: len,
                available: queued,
            });
        }
        if len > 0 {
            self.advance(read, len);
        }
        Ok(())
    }

    /// Buang semua byte yang sedang antri. Returns jumlah byte yang dibuang.
    pub fn clear(&mut self) -> usize {
        let (read, queued) = self.queued();
        if queued > 0 {
            self.advance(read, queued);
        }
        queued
    }
}

/// FIFO dengan satu owner. Pakai [`split`](Fifo::split) untuk dua thread.
pub struct Fifo<S: Storage = HeapStorage> {
    producer: Producer<S>,
    consumer: Consumer<S>,
}

impl Fifo<HeapStorage> {
    /// Membuat FIFO baru di heap. `capacity` HARUS power of 2.
    ///
    /// Alokasi hanya terjadi sekali saat inisialisasi.
    pub fn new(capacity: usize) -> Result<Self, FifoError> {
        let capacity = validate_capacity(capacity)?;
        Self::with_storage(HeapStorage::new(capacity))
    }

    /// Seperti [`new`](Self::new) tapi kapasitas dibulatkan ke power of 2 berikutnya.
    pub fn with_capacity_rounded(requested: usize) -> Result<Self, FifoError> {
        Self::new(round_capacity(requested)?)
    }
}

impl<S: Storage> Fifo<S> {
    /// Membuat FIFO di atas storage apapun. Panjang storage = kapasitas.
    pub fn with_storage(storage: S) -> Result<Self, FifoError> {
        let shared = Arc::new(Shared::new(storage)?);
        debug!(capacity = shared.capacity(), "fifo created");

        Ok(Self {
            producer: Producer {
                shared: shared.clone(),
            },
            consumer: Consumer { shared },
        })
    }

    /// Pecah menjadi handle producer dan consumer (boleh beda thread).
    pub fn split(self) -> (Producer<S>, Consumer<S>) {
        debug!(capacity = self.capacity(), "fifo split");
        (self.producer, self.consumer)
    }

    /// Kapasitas buffer
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    /// Jumlah byte yang sedang antri
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.producer.len()
    }

    /// Cek apakah buffer kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.producer.is_empty()
    }

    /// Ruang kosong dalam byte
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.producer.available()
    }

    /// Cek apakah buffer penuh
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    /// Lihat [`Producer::put`]
    #[inline(always)]
    pub fn put(&mut self, src: &[u8]) -> usize {
        self.producer.put(src)
    }

    /// Lihat [`Consumer::get`]
    #[inline(always)]
    pub fn get(&mut self, dst: &mut [u8]) -> usize {
        self.consumer.get(dst)
    }

    /// Lihat [`Producer::put_all`]
    pub fn put_all(&mut self, src: &[u8]) -> Result<(), FifoError> {
        self.producer.put_all(src)
    }

    /// Lihat [`Consumer::get_exact`]
    pub fn get_exact(&mut self, dst: &mut [u8]) -> Result<(), FifoError> {
        self.consumer.get_exact(dst)
    }

    /// Lihat [`Consumer::peek`]
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        self.consumer.peek(dst)
    }

    /// Lihat [`Producer::write_chunk`]
    pub fn write_chunk(&mut self) -> &mut [u8] {
        self.producer.write_chunk()
    }

    /// Lihat [`Producer::commit`]
    pub fn commit(&mut self, len: usize) -> Result<(), FifoError> {
        self.producer.commit(len)
    }

    /// Lihat [`Consumer::read_chunk`]
    pub fn read_chunk(&self) -> &[u8] {
        self.consumer.read_chunk()
    }

    /// Lihat [`Consumer::release`]
    pub fn release(&mut self, len: usize) -> Result<(), FifoError> {
        self.consumer.release(len)
    }

    /// Lihat [`Consumer::clear`]
    pub fn clear(&mut self) -> usize {
        self.consumer.clear()
    }

    /// Set kedua cursor ke `pos` (FIFO harus kosong). Untuk test overflow.
    #[cfg(all(test, not(feature = "loom")))]
    fn seed_cursors(&mut self, pos: usize) {
        assert!(self.is_empty());
        self.producer.shared.write.value.store(pos, Ordering::Relaxed);
        self.producer.shared.read.value.store(pos, Ordering::Relaxed);
    }

    #[cfg(all(test, not(feature = "loom")))]
    fn storage_bytes(&self) -> &[u8] {
        let shared = &self.producer.shared;
        unsafe { std::slice::from_raw_parts(shared.storage.as_mut_ptr(), shared.capacity()) }
    }
}

/// Buat FIFO di heap dan langsung pecah jadi `(Producer, Consumer)`.
pub fn split(capacity: usize) -> Result<(Producer, Consumer), FifoError> {
    Ok(Fifo::new(capacity)?.split())
}

impl<S: Storage> fmt::Debug for Producer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl<S: Storage> fmt::Debug for Consumer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl<S: Storage> fmt::Debug for Fifo<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fifo")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// `write` mengembalikan short count. FIFO penuh -> `WouldBlock`,
/// supaya `write_all` berhenti dengan error daripada `WriteZero`.
impl<S: Storage> io::Write for Producer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.put(buf) {
            0 => Err(io::ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Non-blocking: FIFO kosong -> `Ok(0)`.
impl<S: Storage> io::Read for Consumer<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.get(buf))
    }
}

impl<S: Storage> io::Write for Fifo<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.producer, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Storage> io::Read for Fifo<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.consumer, buf)
    }
}
