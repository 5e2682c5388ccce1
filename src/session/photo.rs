//! Single-slot bridge from callback-style still capture to async callers.

use crate::device::{CaptureCompletion, CaptureDevice};
use crate::errors::ScanError;
use crate::types::CapturedImage;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type PendingSlot = Arc<Mutex<Option<oneshot::Sender<Result<CapturedImage, ScanError>>>>>;

/// Bridges the callback-driven still-capture API into one-shot async calls.
///
/// At most one request is ever in flight: a second caller is refused before
/// any hardware is touched. The pending slot is the bridge's only state; it
/// is taken under its guard before the waiter observes the outcome, so a
/// completion can never resolve two callers and two completions can never
/// resolve one caller.
pub struct PhotoCaptureBridge {
    pending: PendingSlot,
}

impl PhotoCaptureBridge {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// True while a hardware completion is outstanding.
    pub fn is_capture_pending(&self) -> bool {
        self.pending.lock().expect("pending slot lock poisoned").is_some()
    }

    /// Issue exactly one still-capture request and await its completion.
    pub async fn capture(
        &self,
        device: &Arc<dyn CaptureDevice>,
        flash: bool,
    ) -> Result<CapturedImage, ScanError> {
        let receiver = {
            let mut slot = self.pending.lock().expect("pending slot lock poisoned");
            if slot.is_some() {
                return Err(ScanError::CaptureFailed(
                    "a still capture is already in flight".to_string(),
                ));
            }
            let (sender, receiver) = oneshot::channel();
            *slot = Some(sender);
            receiver
        };

        log::debug!(
            "Issuing still-capture request on device {} (flash: {})",
            device.id(),
            flash
        );
        device.capture_still(flash, resolve_into(Arc::clone(&self.pending)));

        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::CaptureFailed(
                "capture completion was dropped without a result".to_string(),
            )),
        }
    }
}

impl Default for PhotoCaptureBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion that resolves the pending slot exactly once.
fn resolve_into(slot: PendingSlot) -> CaptureCompletion {
    Box::new(move |outcome| {
        // Take the sender out before resolving so a new request can be
        // issued the moment the caller observes this outcome.
        let sender = slot.lock().expect("pending slot lock poisoned").take();
        match sender {
            Some(sender) => {
                if sender.send(outcome).is_err() {
                    log::warn!("Still-capture completion arrived after its waiter was dropped");
                }
            }
            None => log::warn!("Duplicate still-capture completion ignored"),
        }
    })
}
