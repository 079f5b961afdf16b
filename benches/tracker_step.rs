use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;

use rbpf_tracker::{Tracker, TrackerConfig};

fn bench_step(c: &mut Criterion) {
    let mut cfg = TrackerConfig::default();
    cfg.np = 200;
    cfg.max_active_targets = 10;
    let mut tracker = Tracker::create(cfg).unwrap();

    let observations = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0)];

    c.bench_function("tracker_step_two_observations", |b| {
        b.iter(|| tracker.step(&observations));
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
