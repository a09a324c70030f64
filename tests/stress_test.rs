#![cfg(not(feature = "loom"))]

//! Stress Test - Producer/Consumer di dua thread
//!
//! Chunk size diacak (LCG deterministik) di kedua sisi. Consumer harus
//! menerima semua byte, tanpa hilang atau duplikat, dalam urutan yang sama.
//!
//! Usage:
//!   cargo test --release --test stress_test -- --nocapture

use kfifo::{Fifo, MmapStorage, Storage};
use std::thread;
use std::time::Instant;

struct Lcg(u64);

impl Lcg {
    fn next_below(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) as usize % bound
    }
}

/// Byte ke-`pos` dari stream. Modulus prima supaya tidak sejajar dengan capacity.
fn stream_byte(pos: usize) -> u8 {
    (pos.wrapping_mul(31) % 251) as u8
}

fn run_transfer<S: Storage + 'static>(fifo: Fifo<S>, total: usize, max_chunk: usize, seed: u64) {
    let (mut producer, mut consumer) = fifo.split();
    let start = Instant::now();

    let producer_handle = thread::spawn(move || {
        let mut rng = Lcg(seed);
        let mut chunk = vec![0u8; max_chunk];
        let mut sent = 0;

        while sent < total {
            let want = (rng.next_below(max_chunk) + 1).min(total - sent);
            for (i, b) in chunk[..want].iter_mut().enumerate() {
                *b = stream_byte(sent + i);
            }

            let put = producer.put(&chunk[..want]);
            assert!(put <= want);
            if put == 0 {
                thread::yield_now();
            }
            sent += put;
        }
    });

    let mut rng = Lcg(seed ^ 0xDEAD_BEEF);
    let mut buf = vec![0u8; max_chunk];
    let mut received = 0;

    while received < total {
        let want = rng.next_below(max_chunk) + 1;
        let got = consumer.get(&mut buf[..want]);
        assert!(got <= want);
        assert!(consumer.len() <= consumer.capacity());

        for (i, &b) in buf[..got].iter().enumerate() {
            assert_eq!(
                b,
                stream_byte(received + i),
                "mismatch at byte {}",
                received + i
            );
        }
        if got == 0 {
            thread::yield_now();
        }
        received += got;
    }

    producer_handle.join().expect("producer panicked");

    assert_eq!(received, total);
    assert!(consumer.is_empty());
    assert_eq!(consumer.get(&mut buf), 0);

    println!(
        "  {} bytes in {:.2?} (max chunk {})",
        total,
        start.elapsed(),
        max_chunk
    );
}

#[test]
fn stress_small_capacity_large_chunks() {
    // Chunk jauh lebih besar dari capacity: short count terus-menerus
    run_transfer(Fifo::new(16).unwrap(), 1 << 20, 100, 1);
}

#[test]
fn stress_medium_capacity() {
    run_transfer(Fifo::new(1024).unwrap(), 8 << 20, 700, 2);
}

#[test]
fn stress_capacity_one() {
    run_transfer(Fifo::new(1).unwrap(), 64 * 1024, 8, 3);
}

#[test]
fn stress_mmap_storage() {
    let storage = MmapStorage::anonymous(64 * 1024).unwrap();
    run_transfer(Fifo::with_storage(storage).unwrap(), 16 << 20, 9000, 4);
}

#[test]
fn stress_zero_copy_chunks() {
    let (mut producer, mut consumer) = kfifo::split(256).unwrap();
    let total = 1 << 20;

    let producer_handle = thread::spawn(move || {
        let mut sent = 0;
        while sent < total {
            let chunk = producer.write_chunk();
            let n = chunk.len().min(total - sent);
            for (i, b) in chunk[..n].iter_mut().enumerate() {
                *b = stream_byte(sent + i);
            }
            producer.commit(n).unwrap();
            if n == 0 {
                thread::yield_now();
            }
            sent += n;
        }
    });

    let mut received = 0;
    while received < total {
        let chunk = consumer.read_chunk();
        let n = chunk.len();
        for (i, &b) in chunk.iter().enumerate() {
            assert_eq!(b, stream_byte(received + i));
        }
        consumer.release(n).unwrap();
        if n == 0 {
            thread::yield_now();
        }
        received += n;
    }

    producer_handle.join().unwrap();
    assert_eq!(received, total);
}
