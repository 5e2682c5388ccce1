//! Testing utilities for scancam
//!
//! In-memory capture devices, providers, authorization and detector doubles,
//! plus synthetic frames and corner geometry, so the whole engine can be
//! exercised without camera hardware.

pub mod fakes;
pub mod synthetic;

pub use fakes::{FakeAuthorization, FakeCamera, FakeProvider};
pub use synthetic::{
    centered_corners, shifted_corners, synthetic_frame, synthetic_image, ScriptedDetector,
    StaticDetector,
};
