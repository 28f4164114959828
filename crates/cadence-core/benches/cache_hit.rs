use cadence_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn voice_cache(max_size: usize) -> VoiceModelCache {
    VoiceModelCache::new(
        ModelCacheConfig::new(max_size, Duration::from_secs(3600)),
        VoiceModelLoader::in_memory(),
    )
    .unwrap()
}

/// Repeated gets of a resident model
fn bench_warm_hit(c: &mut Criterion) {
    let rt = runtime();
    let voice = VoiceModelConfig::default();
    let cache = voice_cache(4);
    rt.block_on(cache.get(&1, &voice)).unwrap();

    c.bench_function("warm_hit", |b| {
        b.iter(|| {
            let model = rt.block_on(cache.get(black_box(&1), &voice)).unwrap();
            black_box(model);
        });
    });
}

/// Gets that always miss and evict, for growing capacities
fn bench_cold_miss(c: &mut Criterion) {
    let rt = runtime();
    let voice = VoiceModelConfig::default();
    let mut group = c.benchmark_group("cold_miss");

    for max_size in [1usize, 16, 256] {
        let cache = voice_cache(max_size);
        let mut next_id = 0u64;

        group.bench_with_input(BenchmarkId::from_parameter(max_size), &max_size, |b, _| {
            b.iter(|| {
                next_id += 1;
                let model = rt.block_on(cache.get(&next_id, &voice)).unwrap();
                black_box(model);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_warm_hit, bench_cold_miss);
criterion_main!(benches);
