//! kfifo - Benchmark & verifikasi FIFO
//!
//! Subcommand:
//! - `bench`: producer/consumer di dua thread, verifikasi urutan byte
//! - `latency`: put/get single-thread, ns/op

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kfifo::{Consumer, Fifo, HeapStorage, MmapStorage, Producer, Storage};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "kfifo", about = "Lock-free byte FIFO benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two-thread throughput run with byte-order verification
    Bench {
        #[arg(long, default_value_t = 65536)]
        capacity: usize,
        #[arg(long, default_value_t = 256 * 1024 * 1024)]
        bytes: usize,
        #[arg(long, default_value_t = 4096)]
        max_chunk: usize,
        /// Use an anonymous mmap (mlock'd when permitted) instead of the heap
        #[arg(long)]
        mmap: bool,
        /// Pin producer to CPU 0 and consumer to CPU 1 (Linux only)
        #[arg(long)]
        pin: bool,
    },
    /// Single-thread put/get latency
    Latency {
        #[arg(long, default_value_t = 65536)]
        capacity: usize,
        #[arg(long, default_value_t = 1_000_000)]
        iterations: usize,
        #[arg(long, default_value_t = 64)]
        chunk: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Bench {
            capacity,
            bytes,
            max_chunk,
            mmap,
            pin,
        } => {
            if max_chunk == 0 {
                bail!("--max-chunk must be at least 1");
            }
            if mmap {
                let storage = MmapStorage::anonymous_locked(capacity)
                    .with_context(|| format!("failed to map {capacity} bytes"))?;
                let fifo = Fifo::with_storage(storage).context("invalid fifo capacity")?;
                run_bench(fifo, bytes, max_chunk, pin)
            } else {
                let fifo = Fifo::<HeapStorage>::new(capacity).context("invalid fifo capacity")?;
                run_bench(fifo, bytes, max_chunk, pin)
            }
        }
        Commands::Latency {
            capacity,
            iterations,
            chunk,
        } => {
            let fifo = Fifo::new(capacity).context("invalid fifo capacity")?;
            run_latency(fifo, iterations, chunk);
            Ok(())
        }
    }
}

/// Generator chunk size deterministik (LCG)
struct ChunkSizes {
    state: u64,
    max: usize,
}

impl ChunkSizes {
    fn new(seed: u64, max: usize) -> Self {
        Self { state: seed, max }
    }

    fn next_size(&mut self) -> usize {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) as usize % self.max) + 1
    }
}

/// Dihitung di f64: `ops * bytes_per_op` bisa overflow usize
fn megabytes_per_sec(ops: usize, bytes_per_op: usize, secs: f64) -> f64 {
    ops as f64 * bytes_per_op as f64 / secs / 1_000_000.0
}

#[inline(always)]
fn expected_byte(pos: usize) -> u8 {
    (pos % 251) as u8
}

fn run_bench<S: Storage + 'static>(fifo: Fifo<S>, total: usize, max_chunk: usize, pin: bool) -> Result<()> {
    println!("📊 FIFO Throughput (Lock-Free SPSC)");
    println!("-----------------------------------");
    println!("  Capacity:  {} bytes", fifo.capacity());
    println!("  Transfer:  {} bytes", total);
    println!("  Max chunk: {} bytes", max_chunk);

    let (producer, consumer) = fifo.split();
    let start = Instant::now();

    let producer_handle = thread::spawn(move || {
        if pin {
            pin_to_cpu(0);
        }
        produce(producer, total, max_chunk)
    });

    let consumer_handle = thread::spawn(move || {
        if pin {
            pin_to_cpu(1);
        }
        consume(consumer, total, max_chunk)
    });

    let spins = producer_handle
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    let mismatch = consumer_handle
        .join()
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;
    let elapsed = start.elapsed();

    if let Some(pos) = mismatch {
        bail!("byte order violated at position {pos}");
    }

    println!("  Elapsed:   {:.3} s", elapsed.as_secs_f64());
    println!(
        "  Throughput: {:.2} MB/sec",
        megabytes_per_sec(1, total, elapsed.as_secs_f64())
    );
    println!("  Producer full spins: {}", spins);
    info!(total, "all bytes delivered in order");

    Ok(())
}

/// Returns jumlah put yang mengembalikan 0 (FIFO penuh)
fn produce<S: Storage>(mut producer: Producer<S>, total: usize, max_chunk: usize) -> u64 {
    let mut sizes = ChunkSizes::new(0x5EED, max_chunk);
    let mut chunk = vec![0u8; max_chunk];
    let mut sent = 0;
    let mut spins = 0u64;

    while sent < total {
        let want = sizes.next_size().min(total - sent);
        for (i, b) in chunk[..want].iter_mut().enumerate() {
            *b = expected_byte(sent + i);
        }

        let mut offset = 0;
        while offset < want {
            let n = producer.put(&chunk[offset..want]);
            if n == 0 {
                spins += 1;
                std::hint::spin_loop();
            }
            offset += n;
        }
        sent += want;
    }

    spins
}

/// Returns posisi byte pertama yang salah, kalau ada
fn consume<S: Storage>(mut consumer: Consumer<S>, total: usize, max_chunk: usize) -> Option<usize> {
    let mut sizes = ChunkSizes::new(0xC0FFEE, max_chunk);
    let mut buf = vec![0u8; max_chunk];
    let mut received = 0;

    while received < total {
        let want = sizes.next_size().min(total - received);
        let n = consumer.get(&mut buf[..want]);
        if n == 0 {
            std::hint::spin_loop();
            continue;
        }

        for (i, &b) in buf[..n].iter().enumerate() {
            if b != expected_byte(received + i) {
                return Some(received + i);
            }
        }
        received += n;
    }

    None
}

fn run_latency(mut fifo: Fifo, iterations: usize, chunk: usize) {
    println!("📊 FIFO Latency (single thread)");
    println!("-------------------------------");

    let src = vec![0xA5u8; chunk];
    let mut dst = vec![0u8; chunk];

    // Warm up
    for _ in 0..1000 {
        fifo.put(&src);
        fifo.get(&mut dst);
    }

    let start = Instant::now();
    for _ in 0..iterations {
        if fifo.put(&src) < chunk {
            fifo.clear();
        }
    }
    let put_duration = start.elapsed();
    fifo.clear();

    let mut got = 0u64;
    let start = Instant::now();
    for _ in 0..iterations {
        if fifo.is_empty() {
            fifo.put(&src);
        }
        got += fifo.get(&mut dst) as u64;
    }
    let get_duration = start.elapsed();

    let put_ns = put_duration.as_nanos() as f64 / iterations as f64;
    let get_ns = get_duration.as_nanos() as f64 / iterations as f64;

    println!("  Chunk size: {} bytes", chunk);
    println!("  Operations: {}", iterations);
    println!("  Put latency: {:.2} ns/op ({:.3} μs/op)", put_ns, put_ns / 1000.0);
    println!("  Get latency: {:.2} ns/op ({:.3} μs/op)", get_ns, get_ns / 1000.0);
    println!(
        "  Put throughput: {:.2} MB/sec",
        megabytes_per_sec(iterations, chunk, put_duration.as_secs_f64())
    );
    info!(bytes = got, "latency run complete");
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) {
    // SAFETY: cpu_set_t adalah plain data, zeroed valid
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc != 0 {
        warn!(cpu, err = %std::io::Error::last_os_error(), "failed to pin thread");
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(cpu: usize) {
    warn!(cpu, "thread pinning is only supported on Linux");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megabytes_per_sec_large_inputs() {
        let rate = megabytes_per_sec(usize::MAX, 1 << 20, 1.0);
        assert!(rate.is_finite());
        assert!(rate > 1e18);
        assert_eq!(megabytes_per_sec(1_000, 1_000, 1.0), 1.0);
    }

    #[test]
    fn test_chunk_sizes_within_bounds() {
        let mut sizes = ChunkSizes::new(0x5EED, 7);
        for _ in 0..1000 {
            let n = sizes.next_size();
            assert!((1..=7).contains(&n));
        }
    }
}
