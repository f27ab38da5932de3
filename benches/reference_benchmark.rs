use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ephys_align::{
    apply_weights_in_place, fit_weights, remove_common_average, AlignedBlock,
};
use ndarray::Array2;

/// Synthetic aligned block with deterministic pseudo-noise.
fn synthetic_block(rows: usize, channels: usize) -> AlignedBlock {
    let mut data = Array2::<i16>::zeros((rows, channels));
    let mut state = 0x2545f49u64;
    for v in data.iter_mut() {
        // xorshift, folded down to a plausible amplitude
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        *v = (state % 2048) as i16 - 1024;
    }
    AlignedBlock {
        data,
        start_time: 0.0,
        sampling_rate: 30_000.0,
        source: "bench".to_string(),
        channels: (0..channels).map(|c| format!("Port_{}", c + 1)).collect(),
    }
}

pub fn bench_common_average(c: &mut Criterion) {
    let block = synthetic_block(100_000, 32);
    c.bench_function("car_100k_rows_32ch", |b| {
        b.iter(|| {
            let mut work = block.clone();
            remove_common_average(black_box(&mut work)).unwrap();
            black_box(work.num_samples())
        });
    });
}

pub fn bench_weighted_chunked(c: &mut Criterion) {
    let block = synthetic_block(100_000, 32);
    let weights = fit_weights(std::slice::from_ref(&block), 50_000, Some(1)).unwrap();
    for chunk in [1_000usize, 100_000] {
        c.bench_function(&format!("war_100k_rows_32ch_chunk_{chunk}"), |b| {
            b.iter(|| {
                let mut work = block.clone();
                apply_weights_in_place(black_box(&mut work), &weights, chunk).unwrap();
                black_box(work.num_samples())
            });
        });
    }
}

criterion_group!(benches, bench_common_average, bench_weighted_chunked);
criterion_main!(benches);
