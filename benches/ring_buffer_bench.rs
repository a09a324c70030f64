//! Criterion benchmark untuk FIFO
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use kfifo::Fifo;

fn bench_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo");

    for chunk in [1usize, 64, 1500, 16 * 1024].iter() {
        group.throughput(Throughput::Bytes(*chunk as u64));
        group.bench_function(format!("put_get_{}", chunk), |b| {
            let mut fifo = Fifo::new(65536).unwrap();
            let src = vec![0xA5u8; *chunk];
            let mut dst = vec![0u8; *chunk];
            b.iter(|| {
                fifo.put(black_box(&src));
                black_box(fifo.get(&mut dst));
            });
        });
    }

    // Cursor tidak sejajar: setiap transfer kena wrap-around
    group.throughput(Throughput::Bytes(1000));
    group.bench_function("put_get_wrapping", |b| {
        let mut fifo = Fifo::new(4096).unwrap();
        let src = vec![1u8; 1000];
        let mut dst = vec![0u8; 1000];
        fifo.put(&src[..777]);
        b.iter(|| {
            fifo.put(black_box(&src));
            black_box(fifo.get(&mut dst));
        });
    });

    group.finish();
}

fn bench_zero_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_copy");
    group.throughput(Throughput::Bytes(1500));

    group.bench_function("chunk_commit_release", |b| {
        let mut fifo = Fifo::new(65536).unwrap();
        b.iter(|| {
            let chunk = fifo.write_chunk();
            let n = chunk.len().min(1500);
            chunk[..n].fill(0x5A);
            fifo.commit(n).unwrap();
            let n = black_box(fifo.read_chunk()).len();
            fifo.release(n).unwrap();
        });
    });

    group.finish();
}

fn bench_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("threaded");
    const TOTAL: usize = 4 * 1024 * 1024;
    group.throughput(Throughput::Bytes(TOTAL as u64));
    group.sample_size(10);

    group.bench_function("spsc_4MiB", |b| {
        b.iter(|| {
            let (mut producer, mut consumer) = kfifo::split(65536).unwrap();
            let handle = std::thread::spawn(move || {
                let src = [0u8; 4096];
                let mut sent = 0;
                while sent < TOTAL {
                    sent += producer.put(&src[..(TOTAL - sent).min(4096)]);
                }
            });
            let mut dst = [0u8; 4096];
            let mut received = 0;
            while received < TOTAL {
                received += consumer.get(&mut dst);
            }
            handle.join().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_put_get, bench_zero_copy, bench_threaded);
criterion_main!(benches);
