//! Performance benchmarks for the scancam stability path
//!
//! Run with: cargo bench
//!
//! Measures the per-frame cost of the stability predicate and of the full
//! analysis path with detection stubbed out, to keep pipeline overhead per
//! frame in view as the code evolves.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scancam::config::ScancamConfig;
use scancam::geometry::DocumentCorners;
use scancam::scan::detector::{DetectionError, DocumentDetector};
use scancam::scanner::DocumentScanner;
use scancam::testing::{
    centered_corners, shifted_corners, synthetic_frame, FakeAuthorization, FakeProvider,
};
use scancam::types::VideoFrame;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn bench_stability_predicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stability Predicate");
    let base = centered_corners();
    let near = shifted_corners(0.005, 0.005);
    let far = shifted_corners(0.5, 0.25);

    group.bench_function("max_drift", |b| {
        b.iter(|| black_box(base.max_drift(black_box(&near))))
    });
    group.bench_function("is_stable_near", |b| {
        b.iter(|| black_box(base.is_stable_against(black_box(&near), 0.02)))
    });
    group.bench_function("is_stable_far", |b| {
        b.iter(|| black_box(base.is_stable_against(black_box(&far), 0.02)))
    });
    group.finish();
}

/// Detector that alternates between two distant poses so the stable-frame
/// counter keeps resetting and auto-capture never fires mid-benchmark.
struct AlternatingDetector {
    tick: AtomicUsize,
    poses: [DocumentCorners; 2],
}

impl AlternatingDetector {
    fn new() -> Self {
        Self {
            tick: AtomicUsize::new(0),
            poses: [centered_corners(), shifted_corners(0.4, 0.0)],
        }
    }
}

impl DocumentDetector for AlternatingDetector {
    fn detect(&self, _frame: &VideoFrame) -> Result<Option<DocumentCorners>, DetectionError> {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        Ok(Some(self.poses[tick % 2]))
    }
}

fn bench_frame_analysis(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");

    let scanner = DocumentScanner::new(
        Arc::new(FakeProvider::with_back_camera()),
        Arc::new(FakeAuthorization::granted()),
        Arc::new(AlternatingDetector::new()),
        &ScancamConfig::default(),
    );
    runtime
        .block_on(scanner.start_document_scanning(|_| {}))
        .expect("start scanning");

    let frame = Arc::new(synthetic_frame(0, 640, 480));

    let mut group = c.benchmark_group("Frame Analysis");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("process_frame_stubbed_detector", |b| {
        b.iter(|| runtime.block_on(scanner.process_frame(Arc::clone(&frame))))
    });
    group.finish();
}

criterion_group!(benches, bench_stability_predicate, bench_frame_analysis);
criterion_main!(benches);
