use criterion::{criterion_group, criterion_main, Criterion};
use state_passport::config::{DetectorConfig, IndexConfig};
use state_passport::models::Fix;
use state_passport::services::{LocationFilter, RegionIndex, RegionTransitionDetector};
use std::hint::black_box;
use std::sync::Arc;

const BOUNDARIES: &str = "data/us_states_sample.geojson";

fn load_index(config: IndexConfig) -> RegionIndex {
    let index = RegionIndex::new(config);
    index.load_from_file(BOUNDARIES);
    assert!(!index.is_empty(), "Failed to load region boundaries");
    index
}

fn benchmark_region_lookup(c: &mut Criterion) {
    let cached = load_index(IndexConfig::default());
    // A zero-capacity cache forces every lookup through the quadtree
    let uncached = load_index(IndexConfig {
        cache_capacity: 0,
        ..IndexConfig::default()
    });

    let mut group = c.benchmark_group("region_lookup");

    let columbus = Fix::new(39.96, -83.0, chrono::Utc::now());
    group.bench_function("hit_cached", |b| {
        b.iter(|| cached.region_containing(black_box(&columbus)))
    });

    group.bench_function("hit_uncached", |b| {
        b.iter(|| uncached.region_at(black_box(39.96), black_box(-83.0)))
    });

    // Mid-Atlantic Ocean: no candidate polygons at all
    group.bench_function("miss_open_ocean", |b| {
        b.iter(|| uncached.region_at(black_box(30.0), black_box(-45.0)))
    });

    group.finish();
}

fn benchmark_detector_track(c: &mut Criterion) {
    let index = Arc::new(load_index(IndexConfig::default()));

    // A drive from Columbus into Indiana, one fix per kilometer or so
    let start = chrono::Utc::now();
    let track: Vec<Fix> = (0..300)
        .map(|i| {
            let lon = -83.0 - i as f64 * 0.01;
            Fix::new(39.9, lon, start + chrono::Duration::seconds(i * 30))
        })
        .collect();

    c.bench_function("detector_300_fix_track", |b| {
        b.iter(|| {
            let mut detector = RegionTransitionDetector::new(
                index.clone(),
                LocationFilter::default(),
                DetectorConfig::default(),
            );
            for fix in &track {
                black_box(detector.observe(black_box(fix)));
            }
        })
    });
}

criterion_group!(benches, benchmark_region_lookup, benchmark_detector_track);
criterion_main!(benches);
