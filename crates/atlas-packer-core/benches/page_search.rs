use atlas_packer_core::prelude::*;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

fn generate_sizes(count: usize, min_size: u32, max_size: u32) -> Vec<(String, u32, u32)> {
    let mut rng = StdRng::seed_from_u64(count as u64);
    (0..count)
        .map(|i| {
            let w = rng.gen_range(min_size..=max_size);
            let h = rng.gen_range(min_size..=max_size);
            (format!("tex_{}", i), w, h)
        })
        .collect()
}

fn bench_page_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_search");
    group.sample_size(10);

    for count in [25usize, 50, 100] {
        let sizes = generate_sizes(count, 8, 64);
        group.throughput(Throughput::Elements(count as u64));

        for (label, fast) in [("exhaustive", false), ("fast", true)] {
            let settings = Settings::builder()
                .with_max_dimensions(1024, 1024)
                .allow_rotation(true)
                .fast(fast)
                .build();
            group.bench_with_input(BenchmarkId::new(label, count), &sizes, |b, sizes| {
                b.iter(|| black_box(pack_layout(sizes.clone(), &settings)));
            });
        }
    }
    group.finish();
}

fn bench_single_bin(c: &mut Criterion) {
    let mut group = c.benchmark_group("maxrects_bin");
    let sizes = generate_sizes(100, 8, 48);
    let items: Vec<_> = sizes
        .iter()
        .enumerate()
        .map(|(id, (_, w, h))| atlas_packer_core::PackItem {
            id,
            width: *w,
            height: *h,
            can_rotate: true,
        })
        .collect();

    for heuristic in MaxRectsHeuristic::ALL {
        group.bench_with_input(
            BenchmarkId::new(heuristic.short_name(), items.len()),
            &items,
            |b, items| {
                b.iter(|| {
                    let mut bin = MaxRectsBin::new(512, 512, heuristic).with_rotation(true);
                    black_box(bin.pack_exhaustive(items))
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_page_search, bench_single_bin);
criterion_main!(benches);
