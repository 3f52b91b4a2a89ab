//! # Replication Benchmark
//!
//! Per-frame cost of smoothing, packet codec and a full peer frame.
//!
//! Run with: `cargo bench --package tandem_networking`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tandem_networking::{ColliderFlag, ExponentialSmoother, LoopbackHub, PoseSnapshot, SyncPeer};
use tandem_shared::{Pose, Quaternion, TandemConfig, Vec3};

fn bench_smoothing_step(c: &mut Criterion) {
    let smoother = ExponentialSmoother::default();
    let target = Pose::new(
        Vec3::new(3.0, 1.0, -2.0),
        Quaternion::from_euler_degrees(Vec3::new(0.0, 90.0, 0.0)),
    );

    c.bench_function("smoothing_step", |b| {
        let mut pose = Pose::IDENTITY;
        b.iter(|| {
            pose = smoother.step(black_box(pose), black_box(target), 1.0 / 60.0);
        });
    });
}

fn bench_snapshot_codec(c: &mut Criterion) {
    let snapshot = PoseSnapshot {
        object: 42,
        owner: 3,
        epoch: 7,
        sequence: 1_000,
        pose: Pose::new(
            Vec3::new(1.5, 0.25, -7.0),
            Quaternion::from_euler_degrees(Vec3::new(10.0, 20.0, 30.0)),
        ),
        moving: true,
    };
    let bytes = snapshot.encode();

    c.bench_function("snapshot_encode", |b| b.iter(|| black_box(&snapshot).encode()));
    c.bench_function("snapshot_decode", |b| {
        b.iter(|| PoseSnapshot::decode(black_box(&bytes)).unwrap());
    });
}

/// One tracking peer's frame with N objects, all held by another peer.
fn bench_peer_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("peer_frame");

    for objects in [10_u32, 100, 1_000] {
        let hub = LoopbackHub::new();
        let config = TandemConfig::default();
        let (link, inbound) = hub.connect();
        let mut holder = SyncPeer::new(link, inbound, &config);
        let (link, inbound) = hub.connect();
        let mut tracker = SyncPeer::new(link, inbound, &config);

        for object in 0..objects {
            holder.spawn_movable(object, Pose::IDENTITY, ColliderFlag::new());
            tracker.spawn_movable(object, Pose::IDENTITY, ColliderFlag::new());
            holder.pickup(object).unwrap();
        }
        tracker.tick(1.0 / 60.0);

        group.bench_with_input(BenchmarkId::from_parameter(objects), &objects, |b, _| {
            b.iter(|| {
                holder.tick(black_box(1.0 / 60.0));
                tracker.tick(black_box(1.0 / 60.0));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_smoothing_step, bench_snapshot_codec, bench_peer_frame);
criterion_main!(benches);
