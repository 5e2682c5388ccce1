//! Integration tests for the document scan pipeline: stability tracking,
//! auto-capture, backpressure, and mode transitions on synthetic frames.

use scancam::config::ScancamConfig;
use scancam::errors::ScanError;
use scancam::geometry::DocumentCorners;
use scancam::scan::detector::{DetectionError, DocumentDetector};
use scancam::scanner::DocumentScanner;
use scancam::testing::{
    centered_corners, shifted_corners, synthetic_frame, FakeAuthorization, FakeCamera,
    FakeProvider, ScriptedDetector, StaticDetector,
};
use scancam::types::{CapturedImage, ScanMode, VideoFrame};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

/// Scanner on a fake back camera with a running session, ready to scan.
async fn running_scanner(
    detector: Arc<dyn DocumentDetector>,
) -> (Arc<DocumentScanner>, Arc<FakeCamera>) {
    let provider = FakeProvider::with_back_camera();
    let camera = provider.back_camera().unwrap();
    let scanner = Arc::new(DocumentScanner::new(
        Arc::new(provider),
        Arc::new(FakeAuthorization::granted()),
        detector,
        &ScancamConfig::default(),
    ));
    assert!(scanner.request_authorization().await);
    scanner.start_session().await.unwrap();
    (scanner, camera)
}

fn frame(n: u64) -> Arc<VideoFrame> {
    Arc::new(synthetic_frame(n, 64, 48))
}

async fn feed(scanner: &DocumentScanner, start: u64, count: u64) {
    for n in start..start + count {
        scanner.process_frame(frame(n)).await;
    }
}

/// Arm scanning with a channel-backed capture callback.
async fn start_scanning(scanner: &DocumentScanner) -> mpsc::Receiver<CapturedImage> {
    let (tx, rx) = mpsc::channel();
    scanner
        .start_document_scanning(move |image| {
            tx.send(image).unwrap();
        })
        .await
        .unwrap();
    rx
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_auto_capture_fires_on_the_final_stable_frame() {
    let detector = Arc::new(StaticDetector::detecting(centered_corners()));
    let (scanner, camera) = running_scanner(detector).await;
    let captured = start_scanning(&scanner).await;

    // The first frame is only a baseline; 14 comparisons are not enough.
    feed(&scanner, 0, 15).await;
    assert_eq!(scanner.stable_frame_count(), 14);
    assert!(captured.try_recv().is_err());
    assert_eq!(scanner.scanning_mode(), ScanMode::Scanning);

    // The 15th stable comparison triggers the capture.
    feed(&scanner, 15, 1).await;
    let image = captured.try_recv().expect("auto-capture should have fired");
    assert!(image.width > 0);
    assert_eq!(scanner.scanning_mode(), ScanMode::Captured);
    assert_eq!(camera.captures_requested(), 1);

    let state = scanner.state();
    assert!(state.is_document_stable);
    assert_eq!(state.document_scanning_mode, ScanMode::Captured);
}

#[tokio::test]
async fn test_exactly_one_capture_per_scan_activation() {
    let detector = Arc::new(StaticDetector::detecting(centered_corners()));
    let (scanner, camera) = running_scanner(Arc::clone(&detector) as _).await;
    let captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 30).await;

    assert!(captured.try_recv().is_ok());
    assert!(captured.try_recv().is_err());
    assert_eq!(camera.captures_requested(), 1);
    // Frames after the capture are ignored entirely.
    assert_eq!(detector.calls(), 16);
}

#[tokio::test]
async fn test_jitter_below_threshold_counts_as_stable() {
    let mut outcomes: Vec<Result<Option<DocumentCorners>, DetectionError>> = Vec::new();
    for i in 0..16 {
        // 0.005 normalized units of alternating jitter, well under 0.02.
        let dx = if i % 2 == 0 { 0.0 } else { 0.005 };
        outcomes.push(Ok(Some(shifted_corners(dx, 0.0))));
    }
    let (scanner, camera) = running_scanner(Arc::new(ScriptedDetector::new(outcomes))).await;
    let captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 16).await;

    assert!(captured.try_recv().is_ok());
    assert_eq!(camera.captures_requested(), 1);
}

#[tokio::test]
async fn test_drift_above_threshold_restarts_the_window() {
    let mut outcomes: Vec<Result<Option<DocumentCorners>, DetectionError>> =
        vec![Ok(Some(centered_corners())); 10];
    outcomes.push(Ok(Some(shifted_corners(0.5, 0.0))));
    outcomes.extend(vec![Ok(Some(shifted_corners(0.5, 0.0))); 15]);
    let (scanner, camera) = running_scanner(Arc::new(ScriptedDetector::new(outcomes))).await;
    let captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 10).await;
    assert_eq!(scanner.stable_frame_count(), 9);

    // The jump zeroes the counter but keeps the document detected.
    feed(&scanner, 10, 1).await;
    assert_eq!(scanner.stable_frame_count(), 0);
    assert!(scanner.state().detected_corners.is_some());
    assert!(captured.try_recv().is_err());

    // A full fresh window at the new pose is required.
    feed(&scanner, 11, 15).await;
    assert!(captured.try_recv().is_ok());
    assert_eq!(camera.captures_requested(), 1);
}

#[tokio::test]
async fn test_detection_loss_clears_tracking_immediately() {
    let mut outcomes: Vec<Result<Option<DocumentCorners>, DetectionError>> =
        vec![Ok(Some(centered_corners())); 10];
    outcomes.push(Ok(None));
    outcomes.extend(vec![Ok(Some(centered_corners())); 16]);
    let (scanner, camera) = running_scanner(Arc::new(ScriptedDetector::new(outcomes))).await;
    let captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 10).await;
    assert_eq!(scanner.stable_frame_count(), 9);

    // One undetected frame: corners gone, counter zeroed.
    feed(&scanner, 10, 1).await;
    let state = scanner.state();
    assert!(state.detected_corners.is_none());
    assert!(!state.is_document_stable);
    assert_eq!(scanner.stable_frame_count(), 0);

    // Redetection starts over: baseline plus 15 comparisons.
    feed(&scanner, 11, 16).await;
    assert!(captured.try_recv().is_ok());
    assert_eq!(camera.captures_requested(), 1);
}

#[tokio::test]
async fn test_detector_error_keeps_tracking_intact() {
    let mut outcomes: Vec<Result<Option<DocumentCorners>, DetectionError>> =
        vec![Ok(Some(centered_corners())); 5];
    outcomes.push(Err(DetectionError::new("motion blur")));
    outcomes.push(Ok(Some(centered_corners())));
    let (scanner, camera) = running_scanner(Arc::new(ScriptedDetector::new(outcomes))).await;
    let _captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 5).await;
    assert_eq!(scanner.stable_frame_count(), 4);

    // A failed analysis contributes nothing, unlike a no-detection result.
    feed(&scanner, 5, 1).await;
    assert_eq!(scanner.stable_frame_count(), 4);
    assert!(scanner.state().detected_corners.is_some());

    // The next detection compares against the pre-error corners.
    feed(&scanner, 6, 1).await;
    assert_eq!(scanner.stable_frame_count(), 5);
    assert_eq!(camera.captures_requested(), 0);
}

#[tokio::test]
async fn test_failed_auto_capture_retries_only_after_a_fresh_window() {
    let mut outcomes: Vec<Result<Option<DocumentCorners>, DetectionError>> =
        vec![Ok(Some(centered_corners())); 19];
    outcomes.push(Ok(None));
    outcomes.extend(vec![Ok(Some(centered_corners())); 16]);
    let (scanner, camera) = running_scanner(Arc::new(ScriptedDetector::new(outcomes))).await;
    let captured = start_scanning(&scanner).await;

    camera.fail_next_capture("flash misfire");

    // The window completes, the capture fails, and scanning continues with
    // stability retained.
    feed(&scanner, 0, 16).await;
    assert!(captured.try_recv().is_err());
    assert_eq!(scanner.scanning_mode(), ScanMode::Scanning);
    assert!(scanner.state().is_document_stable);
    assert_eq!(camera.captures_requested(), 1);

    // Further stable frames do not re-trigger while the flag is latched.
    feed(&scanner, 16, 3).await;
    assert_eq!(camera.captures_requested(), 1);

    // After a reset, a complete fresh window triggers a second attempt.
    feed(&scanner, 19, 17).await;
    let image = captured.try_recv().expect("second attempt should capture");
    assert!(image.width > 0);
    assert_eq!(camera.captures_requested(), 2);
    assert_eq!(scanner.scanning_mode(), ScanMode::Captured);
}

#[tokio::test]
async fn test_manual_capture_returns_the_image_directly() {
    let detector = Arc::new(StaticDetector::detecting(centered_corners()));
    let (scanner, camera) = running_scanner(Arc::clone(&detector) as _).await;
    let captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 5).await;
    let image = scanner.capture_document().await.unwrap();
    assert!(image.width > 0);

    // Manual capture bypasses the scanning callback.
    assert!(captured.try_recv().is_err());
    assert_eq!(scanner.scanning_mode(), ScanMode::Captured);
    assert_eq!(camera.captures_requested(), 1);

    // And ends the analysis of further frames.
    feed(&scanner, 5, 5).await;
    assert_eq!(detector.calls(), 5);
}

#[tokio::test]
async fn test_manual_capture_without_detection_is_refused() {
    let (scanner, camera) =
        running_scanner(Arc::new(StaticDetector::detecting(centered_corners()))).await;
    let _captured = start_scanning(&scanner).await;

    let result = scanner.capture_document().await;
    assert!(matches!(result, Err(ScanError::NoDocumentDetected)));
    assert_eq!(camera.captures_requested(), 0);
    assert_eq!(scanner.scanning_mode(), ScanMode::Scanning);
}

#[tokio::test]
async fn test_frames_outside_scanning_mode_are_not_analyzed() {
    let detector = Arc::new(StaticDetector::detecting(centered_corners()));
    let (scanner, _camera) = running_scanner(Arc::clone(&detector) as _).await;

    // Scanning never started.
    feed(&scanner, 0, 10).await;
    assert_eq!(detector.calls(), 0);
    assert_eq!(scanner.state().document_scanning_mode, ScanMode::Inactive);

    // Started then stopped: frames are ignored again.
    let _captured = start_scanning(&scanner).await;
    feed(&scanner, 10, 2).await;
    scanner.stop_document_scanning();
    feed(&scanner, 12, 10).await;
    assert_eq!(detector.calls(), 2);
    assert!(scanner.state().detected_corners.is_none());
}

/// Detector that blocks inside detect() until the test releases it.
struct GatedDetector {
    gate: Mutex<mpsc::Receiver<()>>,
    calls: AtomicUsize,
}

impl GatedDetector {
    fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self {
                gate: Mutex::new(rx),
                calls: AtomicUsize::new(0),
            }),
            tx,
        )
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentDetector for GatedDetector {
    fn detect(&self, _frame: &VideoFrame) -> Result<Option<DocumentCorners>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate
            .lock()
            .expect("gate lock poisoned")
            .recv()
            .map_err(|_| DetectionError::new("gate closed"))?;
        Ok(Some(centered_corners()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_frames_during_analysis_are_dropped_not_queued() {
    let (detector, gate) = GatedDetector::new();
    let (scanner, camera) = running_scanner(Arc::clone(&detector) as _).await;
    let _captured = start_scanning(&scanner).await;

    // First live frame claims the analysis slot and blocks on the gate.
    camera.emit_frame(synthetic_frame(0, 64, 48));
    // Everything arriving while it runs is discarded at the door.
    for n in 1..=5 {
        camera.emit_frame(synthetic_frame(n, 64, 48));
    }
    assert_eq!(scanner.frames_dropped(), 5);

    wait_until("first analysis to start", || detector.calls() == 1).await;
    gate.send(()).unwrap();
    wait_until("first analysis to finish", || {
        scanner.state().detected_corners.is_some()
    })
    .await;

    // Dropped frames are gone for good: give a hypothetical queue time to
    // replay, then confirm nothing further was analyzed.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(detector.calls(), 1);
    assert_eq!(scanner.frames_dropped(), 5);

    // A genuinely new frame is analyzed normally once the slot is free.
    gate.send(()).unwrap();
    scanner.process_frame(frame(6)).await;
    assert_eq!(detector.calls(), 2);
    assert_eq!(scanner.stable_frame_count(), 1);
    assert_eq!(scanner.frames_dropped(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_while_capture_in_flight_discards_the_image() {
    let detector = Arc::new(StaticDetector::detecting(centered_corners()));
    let (scanner, camera) = running_scanner(detector).await;
    let captured = start_scanning(&scanner).await;

    feed(&scanner, 0, 15).await;
    camera.hold_completions();

    // The triggering frame parks inside the capture await.
    let trigger = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move { scanner.process_frame(frame(15)).await })
    };
    wait_until("capture request to reach the camera", || {
        camera.captures_requested() == 1
    })
    .await;

    scanner.stop_document_scanning();
    assert!(camera.release_next());

    tokio::time::timeout(Duration::from_secs(5), trigger)
        .await
        .expect("trigger frame should finish")
        .unwrap();

    // The image arrived after scanning stopped and was discarded.
    assert!(captured.try_recv().is_err());
    assert_eq!(scanner.scanning_mode(), ScanMode::Inactive);
    assert!(scanner.state().detected_corners.is_none());
}

#[tokio::test]
async fn test_restarting_scanning_resets_tracking() {
    let detector = Arc::new(StaticDetector::detecting(centered_corners()));
    let (scanner, camera) = running_scanner(detector).await;

    let first = start_scanning(&scanner).await;
    feed(&scanner, 0, 16).await;
    assert!(first.try_recv().is_ok());
    assert_eq!(scanner.scanning_mode(), ScanMode::Captured);

    // A new activation starts from a clean slate and captures again.
    let second = start_scanning(&scanner).await;
    assert_eq!(scanner.stable_frame_count(), 0);
    assert!(scanner.state().detected_corners.is_none());

    feed(&scanner, 16, 16).await;
    assert!(second.try_recv().is_ok());
    assert_eq!(camera.captures_requested(), 2);
}
