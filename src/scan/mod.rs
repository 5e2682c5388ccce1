//! Document scan pipeline: turns a high-rate live frame stream into a
//! debounced, stability-gated single capture event.

pub mod detector;

use crate::config::ScanningConfig;
use crate::device::FrameHandler;
use crate::errors::ScanError;
use crate::geometry::DocumentCorners;
use crate::scanner::SharedScannerState;
use crate::session::CaptureSession;
use crate::types::{CapturedImage, ScanMode, VideoFrame};
use detector::DocumentDetector;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;

/// Callback invoked once with the auto-captured document.
pub type CaptureCallback = Box<dyn FnOnce(CapturedImage) + Send>;

/// Outcome of one stability evaluation.
#[derive(Debug, PartialEq, Eq)]
enum StabilityDecision {
    /// Threshold newly reached while scanning: trigger the capture.
    AutoCapture,
    /// Keep tracking.
    Continue,
}

/// Mutable scan state, owned by the pipeline behind one guard.
struct ScanState {
    mode: ScanMode,
    detected_corners: Option<DocumentCorners>,
    previous_corners: Option<DocumentCorners>,
    stable_frames: u32,
    is_stable: bool,
    on_capture: Option<CaptureCallback>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            mode: ScanMode::Inactive,
            detected_corners: None,
            previous_corners: None,
            stable_frames: 0,
            is_stable: false,
            on_capture: None,
        }
    }

    /// Zero the corner tracking without touching mode or callback.
    fn reset_tracking(&mut self) {
        self.detected_corners = None;
        self.previous_corners = None;
        self.stable_frames = 0;
        self.is_stable = false;
    }
}

/// One stability evaluation against the previous analyzed corners.
///
/// Increments the consecutive-stable counter or zeroes it, latches the
/// is-stable flag once the required count is reached, and always supersedes
/// the previous corners. The latch keeps a retained counter from
/// re-triggering until tracking has been reset by an unstable or undetected
/// frame.
fn evaluate_stability(
    scan: &mut ScanState,
    corners: DocumentCorners,
    threshold: f32,
    required_stable_frames: u32,
) -> StabilityDecision {
    let stable_pair = scan
        .previous_corners
        .map(|previous| corners.is_stable_against(&previous, threshold))
        .unwrap_or(false);

    let mut decision = StabilityDecision::Continue;
    if stable_pair {
        scan.stable_frames += 1;
        if scan.stable_frames >= required_stable_frames && !scan.is_stable {
            scan.is_stable = true;
            decision = StabilityDecision::AutoCapture;
        }
    } else {
        scan.stable_frames = 0;
        scan.is_stable = false;
    }

    scan.previous_corners = Some(corners);
    scan.detected_corners = Some(corners);
    decision
}

/// Stability-gated document capture over the live frame stream.
///
/// Frames arrive on the device's delivery context and are dropped, not
/// queued, while an analysis is in progress, so analyses never overlap and
/// delivery never blocks. Detection runs on the blocking pool; state changes
/// funnel through one guard and are published as complete snapshots.
pub struct DocumentScanPipeline {
    shared: Arc<PipelineShared>,
}

struct PipelineShared {
    session: Arc<CaptureSession>,
    detector: Arc<dyn DocumentDetector>,
    state_out: Arc<SharedScannerState>,
    scan: Mutex<ScanState>,
    /// Mirror of `mode == Scanning` for the non-blocking delivery path.
    scanning_active: AtomicBool,
    analysis_busy: AtomicBool,
    frames_dropped: AtomicU64,
    tap_attached: AtomicBool,
    runtime: Mutex<Option<Handle>>,
    stability_threshold: f32,
    required_stable_frames: u32,
}

/// Clears the busy flag when an analysis task finishes, even on panic.
struct BusyReset(Arc<PipelineShared>);

impl Drop for BusyReset {
    fn drop(&mut self) {
        self.0.analysis_busy.store(false, Ordering::SeqCst);
    }
}

impl DocumentScanPipeline {
    pub(crate) fn new(
        session: Arc<CaptureSession>,
        detector: Arc<dyn DocumentDetector>,
        state_out: Arc<SharedScannerState>,
        tuning: &ScanningConfig,
    ) -> Self {
        Self {
            shared: Arc::new(PipelineShared {
                session,
                detector,
                state_out,
                scan: Mutex::new(ScanState::new()),
                scanning_active: AtomicBool::new(false),
                analysis_busy: AtomicBool::new(false),
                frames_dropped: AtomicU64::new(0),
                tap_attached: AtomicBool::new(false),
                runtime: Mutex::new(None),
                stability_threshold: tuning.stability_threshold,
                required_stable_frames: tuning.required_stable_frames,
            }),
        }
    }

    /// Enter scanning mode and arm auto-capture.
    ///
    /// Resets all corner tracking, stores the completion callback, and
    /// attaches the frame tap through the session controller on first use
    /// (the tap stays installed afterwards and goes inert between scans).
    pub async fn start_document_scanning(
        &self,
        on_capture: impl FnOnce(CapturedImage) + Send + 'static,
    ) -> Result<(), ScanError> {
        {
            let mut scan = self.shared.scan.lock().expect("scan state lock poisoned");
            scan.mode = ScanMode::Scanning;
            scan.reset_tracking();
            scan.on_capture = Some(Box::new(on_capture));
        }
        *self
            .shared
            .runtime
            .lock()
            .expect("runtime handle lock poisoned") = Some(Handle::current());
        self.shared.scanning_active.store(true, Ordering::SeqCst);
        self.shared.publish_tracking();

        if !self.shared.tap_attached.swap(true, Ordering::SeqCst) {
            let tap = PipelineShared::frame_tap(&self.shared);
            if let Err(e) = self.shared.session.install_frame_tap(tap).await {
                self.shared.tap_attached.store(false, Ordering::SeqCst);
                self.shared.scanning_active.store(false, Ordering::SeqCst);
                {
                    let mut scan = self.shared.scan.lock().expect("scan state lock poisoned");
                    scan.mode = ScanMode::Inactive;
                    scan.reset_tracking();
                    scan.on_capture = None;
                }
                self.shared.publish_tracking();
                return Err(e);
            }
        }

        log::info!("Document scanning started");
        Ok(())
    }

    /// Leave scanning mode and clear all tracking state.
    ///
    /// Safe at any point; an in-flight analysis or capture completes but its
    /// result is discarded because the mode is no longer `Scanning`.
    pub fn stop_document_scanning(&self) {
        self.shared.scanning_active.store(false, Ordering::SeqCst);
        {
            let mut scan = self.shared.scan.lock().expect("scan state lock poisoned");
            scan.mode = ScanMode::Inactive;
            scan.reset_tracking();
            scan.on_capture = None;
        }
        self.shared.publish_tracking();
        log::info!("Document scanning stopped");
    }

    /// Manually capture the currently detected document.
    ///
    /// Unlike auto-capture, failures propagate to the caller; the captured
    /// image is returned rather than delivered through the scanning callback.
    pub async fn capture_document(&self) -> Result<CapturedImage, ScanError> {
        {
            let mut scan = self.shared.scan.lock().expect("scan state lock poisoned");
            if scan.detected_corners.is_none() {
                return Err(ScanError::NoDocumentDetected);
            }
            scan.mode = ScanMode::Captured;
        }
        self.shared.scanning_active.store(false, Ordering::SeqCst);
        self.shared.publish_tracking();

        self.shared.session.capture_photo().await
    }

    /// Run the full analysis for one frame.
    ///
    /// This is the analysis body without the busy gate, exposed so offline
    /// tests can drive frames deterministically; live frames go through the
    /// installed tap, which adds the drop-if-busy check in front.
    pub async fn process_frame(&self, frame: Arc<VideoFrame>) {
        PipelineShared::process(Arc::clone(&self.shared), frame).await;
    }

    pub fn mode(&self) -> ScanMode {
        self.shared.scan.lock().expect("scan state lock poisoned").mode
    }

    /// Consecutive stable frames observed so far.
    pub fn stable_frame_count(&self) -> u32 {
        self.shared
            .scan
            .lock()
            .expect("scan state lock poisoned")
            .stable_frames
    }

    /// Frames dropped by the backpressure rule since construction.
    pub fn frames_dropped(&self) -> u64 {
        self.shared.frames_dropped.load(Ordering::SeqCst)
    }
}

impl PipelineShared {
    /// Build the frame tap handed to the session controller.
    ///
    /// Holds only a weak reference so a dropped scanner does not keep the
    /// pipeline alive through the device's stored handler.
    fn frame_tap(shared: &Arc<Self>) -> FrameHandler {
        let weak: Weak<PipelineShared> = Arc::downgrade(shared);
        Arc::new(move |frame: Arc<VideoFrame>| {
            if let Some(shared) = weak.upgrade() {
                PipelineShared::on_frame(shared, frame);
            }
        })
    }

    /// Frame-arrival gate, invoked on the device's delivery context.
    ///
    /// Never blocks: frames outside scanning mode are ignored, frames
    /// arriving while an analysis runs are dropped and counted.
    fn on_frame(shared: Arc<Self>, frame: Arc<VideoFrame>) {
        if !shared.scanning_active.load(Ordering::SeqCst) {
            return;
        }

        if shared
            .analysis_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let dropped = shared.frames_dropped.fetch_add(1, Ordering::SeqCst) + 1;
            if dropped % 30 == 0 {
                log::debug!("Dropped {} frames while analysis was busy", dropped);
            }
            return;
        }

        let handle = shared
            .runtime
            .lock()
            .expect("runtime handle lock poisoned")
            .clone();
        let handle = match handle {
            Some(handle) => handle,
            None => {
                shared.analysis_busy.store(false, Ordering::SeqCst);
                return;
            }
        };

        handle.spawn(async move {
            let _busy = BusyReset(Arc::clone(&shared));
            PipelineShared::process(shared, frame).await;
        });
    }

    /// Detector call plus state transition for one frame.
    async fn process(shared: Arc<Self>, frame: Arc<VideoFrame>) {
        // The mode may have flipped between delivery and this task running.
        if !shared.scanning_active.load(Ordering::SeqCst) {
            return;
        }

        let detector = Arc::clone(&shared.detector);
        let input = Arc::clone(&frame);
        let detection = tokio::task::spawn_blocking(move || detector.detect(&input)).await;

        let detection = match detection {
            Ok(result) => result,
            Err(e) => {
                // The detector task fell over; same contract as a detector
                // error: this frame contributes nothing.
                log::warn!("Detection task failed: {}", e);
                return;
            }
        };

        match detection {
            Err(e) => {
                // Transient detector failure: no state change, stability kept.
                log::debug!("Corner detection failed on frame {}: {}", frame.id, e);
            }
            Ok(None) => {
                // A single undetected frame breaks stability immediately.
                {
                    let mut scan = shared.scan.lock().expect("scan state lock poisoned");
                    if scan.mode != ScanMode::Scanning {
                        return;
                    }
                    scan.reset_tracking();
                }
                shared.publish_tracking();
            }
            Ok(Some(corners)) => {
                let decision = {
                    let mut scan = shared.scan.lock().expect("scan state lock poisoned");
                    if scan.mode != ScanMode::Scanning {
                        return;
                    }
                    evaluate_stability(
                        &mut scan,
                        corners,
                        shared.stability_threshold,
                        shared.required_stable_frames,
                    )
                };
                shared.publish_tracking();

                if decision == StabilityDecision::AutoCapture {
                    Self::auto_capture(shared).await;
                }
            }
        }
    }

    /// Capture, then flip to `Captured`, then deliver through the callback.
    ///
    /// The mode is re-checked after the await: if scanning stopped while the
    /// capture was in flight, the image is discarded. A failed capture is
    /// logged and swallowed with counter and flag retained, so a fresh
    /// stable window can try again.
    async fn auto_capture(shared: Arc<Self>) {
        log::info!("Document pose stable; triggering auto-capture");

        match shared.session.capture_photo().await {
            Ok(image) => {
                let callback = {
                    let mut scan = shared.scan.lock().expect("scan state lock poisoned");
                    if scan.mode == ScanMode::Scanning {
                        scan.mode = ScanMode::Captured;
                        scan.on_capture.take()
                    } else {
                        None
                    }
                };

                match callback {
                    Some(callback) => {
                        shared.scanning_active.store(false, Ordering::SeqCst);
                        shared.publish_tracking();
                        log::info!("Document auto-captured ({}x{})", image.width, image.height);
                        callback(image);
                    }
                    None => {
                        log::debug!(
                            "Discarding captured document; scanning stopped while capture was in flight"
                        );
                    }
                }
            }
            Err(e) => {
                log::error!("Automatic document capture failed: {}", e);
            }
        }
    }

    /// Publish the current tracking fields as one snapshot.
    fn publish_tracking(&self) {
        let (mode, corners, stable) = {
            let scan = self.scan.lock().expect("scan state lock poisoned");
            (scan.mode, scan.detected_corners, scan.is_stable)
        };
        self.state_out.update(|s| {
            s.document_scanning_mode = mode;
            s.detected_corners = corners;
            s.is_document_stable = stable;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormalizedPoint;

    fn corners_at(offset: f32) -> DocumentCorners {
        DocumentCorners::new(
            NormalizedPoint::new(0.2 + offset, 0.2),
            NormalizedPoint::new(0.8 + offset, 0.2),
            NormalizedPoint::new(0.2 + offset, 0.8),
            NormalizedPoint::new(0.8 + offset, 0.8),
        )
    }

    #[test]
    fn test_counter_reaches_threshold_and_triggers_once() {
        let mut scan = ScanState::new();
        scan.mode = ScanMode::Scanning;
        let c = corners_at(0.0);

        // First detection has nothing to compare against.
        assert_eq!(evaluate_stability(&mut scan, c, 0.02, 15), StabilityDecision::Continue);
        assert_eq!(scan.stable_frames, 0);

        for i in 1..15 {
            assert_eq!(evaluate_stability(&mut scan, c, 0.02, 15), StabilityDecision::Continue);
            assert_eq!(scan.stable_frames, i);
            assert!(!scan.is_stable);
        }

        // The 15th stable comparison latches and triggers.
        assert_eq!(evaluate_stability(&mut scan, c, 0.02, 15), StabilityDecision::AutoCapture);
        assert_eq!(scan.stable_frames, 15);
        assert!(scan.is_stable);

        // Latched: further stable frames keep counting but never re-trigger.
        assert_eq!(evaluate_stability(&mut scan, c, 0.02, 15), StabilityDecision::Continue);
        assert_eq!(scan.stable_frames, 16);
    }

    #[test]
    fn test_unstable_pair_zeroes_counter() {
        let mut scan = ScanState::new();
        scan.mode = ScanMode::Scanning;

        let c = corners_at(0.0);
        evaluate_stability(&mut scan, c, 0.02, 15);
        for _ in 0..10 {
            evaluate_stability(&mut scan, c, 0.02, 15);
        }
        assert_eq!(scan.stable_frames, 10);

        // Far outside the threshold: hard reset, corners superseded.
        let moved = corners_at(0.5);
        assert_eq!(evaluate_stability(&mut scan, moved, 0.02, 15), StabilityDecision::Continue);
        assert_eq!(scan.stable_frames, 0);
        assert!(!scan.is_stable);
        assert_eq!(scan.previous_corners, Some(moved));
        assert_eq!(scan.detected_corners, Some(moved));
    }

    #[test]
    fn test_alternating_poses_never_become_stable() {
        let mut scan = ScanState::new();
        scan.mode = ScanMode::Scanning;

        // Every consecutive pair fails the threshold.
        for i in 0..40 {
            let pose = corners_at(if i % 2 == 0 { 0.0 } else { 0.4 });
            assert_eq!(
                evaluate_stability(&mut scan, pose, 0.02, 15),
                StabilityDecision::Continue
            );
            assert_eq!(scan.stable_frames, 0);
            assert!(!scan.is_stable);
        }
    }

    #[test]
    fn test_reset_tracking_clears_comparison_baseline() {
        let mut scan = ScanState::new();
        scan.mode = ScanMode::Scanning;

        let c = corners_at(0.0);
        evaluate_stability(&mut scan, c, 0.02, 15);
        evaluate_stability(&mut scan, c, 0.02, 15);
        assert_eq!(scan.stable_frames, 1);

        scan.reset_tracking();
        assert!(scan.previous_corners.is_none());

        // After a reset the first detection cannot count as stable.
        assert_eq!(evaluate_stability(&mut scan, c, 0.02, 15), StabilityDecision::Continue);
        assert_eq!(scan.stable_frames, 0);
    }
}
