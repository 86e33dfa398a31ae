//! Codebook construction and per-cycle matching benchmarks.
//!
//! Run with: cargo bench -p ris-core --bench codebook

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ris_core::{
    BitPolicy, CycleDriver, DriverConfig, Mapper, PhaseStateSet, build_codebook, phase_gradient,
    target_phases,
};

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_codebook");
    let binary = PhaseStateSet::new(vec![0.0, 180.0]).unwrap();
    for l in [4usize, 8, 12] {
        group.bench_with_input(BenchmarkId::new("binary", l), &l, |b, &l| {
            b.iter(|| build_codebook(black_box(&binary), l, 0.6))
        });
    }
    let quad = PhaseStateSet::new(vec![0.0, 90.0, 180.0, 270.0]).unwrap();
    group.bench_function("quad_L6", |b| b.iter(|| build_codebook(black_box(&quad), 6, 0.6)));
    group.finish();
}

fn bench_match(c: &mut Criterion) {
    let binary = PhaseStateSet::new(vec![0.0, 180.0]).unwrap();
    let cb = build_codebook(&binary, 12, 0.3).unwrap();
    let mapper = Mapper::new(&cb, BitPolicy::Midpoint);
    let targets = target_phases(45.0, phase_gradient(30.0, 0.5), 16, None);

    c.bench_function("resolve_16_positions_L12", |b| {
        b.iter(|| mapper.resolve(black_box(&targets)))
    });
}

fn bench_cycle(c: &mut Criterion) {
    let binary = PhaseStateSet::new(vec![0.0, 180.0]).unwrap();
    let cb = build_codebook(&binary, 4, 0.6).unwrap();
    let mut driver = CycleDriver::new(DriverConfig::default(), cb).unwrap();
    c.bench_function("next_frame_default", |b| b.iter(|| driver.get_next_frame()));
}

criterion_group!(benches, bench_build, bench_match, bench_cycle);
criterion_main!(benches);
