use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wirec::dsa::{CountMinSketch, TopHeavyHitters};

fn bench_sketch_add(c: &mut Criterion) {
    let mut sketch = CountMinSketch::new(16, 1024, 0).unwrap();
    let keys: Vec<String> = (0..512).map(|i| format!("/user/worker-{}", i)).collect();
    let mut i = 0usize;

    c.bench_function("count_min_add", |b| {
        b.iter(|| {
            i = (i + 1) & 511;
            black_box(sketch.add(keys[i].as_str(), 1).unwrap());
        })
    });
}

fn bench_heavy_hitters_warm(c: &mut Criterion) {
    // Warm tracker: most updates hit the O(1) reject path.
    let mut tracker = TopHeavyHitters::new(256).unwrap();
    for i in 0..256u64 {
        tracker.update(&i, 1_000 + i).unwrap();
    }
    let mut i = 0u64;

    c.bench_function("heavy_hitters_reject", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(tracker.update(&(10_000 + (i & 1023)), 1).unwrap());
        })
    });
}

criterion_group!(benches, bench_sketch_add, bench_heavy_hitters_warm);
criterion_main!(benches);
