//! Benchmark for chunk generation and snapshot encoding.
//!
//! Run with: cargo bench --package tessera_procedural --bench chunk_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tessera_procedural::{Chunk, ChunkCoord, TerrainGenerator, WorldSeed};

const CHUNK_SIZE: u32 = 32;

fn benchmark_single_chunk(c: &mut Criterion) {
    let gen = TerrainGenerator::with_seed(WorldSeed::new(42));

    c.bench_function("single_chunk_generation", |b| {
        let mut coord = 0i32;
        b.iter(|| {
            coord = coord.wrapping_add(1);
            black_box(gen.generate_chunk(ChunkCoord::new(coord, coord / 2), CHUNK_SIZE))
        });
    });
}

fn benchmark_chunk_grid(c: &mut Criterion) {
    let gen = TerrainGenerator::with_seed(WorldSeed::new(42));

    let mut group = c.benchmark_group("chunk_grid");
    group.sample_size(10);
    group.throughput(Throughput::Elements(8 * 8));
    group.bench_function("8x8_chunks", |b| {
        b.iter(|| {
            for y in 0..8 {
                for x in 0..8 {
                    black_box(gen.generate_chunk(ChunkCoord::new(x, y), CHUNK_SIZE));
                }
            }
        });
    });
    group.finish();
}

fn benchmark_snapshot(c: &mut Criterion) {
    let gen = TerrainGenerator::with_seed(WorldSeed::new(42));
    let coord = ChunkCoord::new(4, -2);
    let chunk = gen.generate_chunk(coord, CHUNK_SIZE);
    let bytes = chunk.encode_snapshot();

    c.bench_function("snapshot_encode", |b| b.iter(|| black_box(chunk.encode_snapshot())));
    c.bench_function("snapshot_decode", |b| {
        b.iter(|| black_box(Chunk::decode_snapshot(&bytes, coord, CHUNK_SIZE)))
    });
}

criterion_group!(benches, benchmark_single_chunk, benchmark_chunk_grid, benchmark_snapshot);
criterion_main!(benches);
