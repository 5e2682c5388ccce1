//! Core value types shared across the scanning engine.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Facing of a capture device relative to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    /// User-facing camera (selfie side).
    Front,
    /// World-facing camera (document side).
    Back,
}

impl CameraPosition {
    /// The opposite facing, used by camera switching.
    pub fn opposite(&self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPosition::Front => "front",
            CameraPosition::Back => "back",
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mode of the document scan pipeline.
///
/// `Inactive` is the initial state. `Captured` is entered after a successful
/// capture and suspends further auto-captures until scanning is restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Inactive,
    Scanning,
    Captured,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Inactive => "inactive",
            ScanMode::Scanning => "scanning",
            ScanMode::Captured => "captured",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One video frame delivered by the live stream.
///
/// The payload is an opaque pixel buffer in the device's delivery format;
/// only the detector interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFrame {
    pub id: Uuid,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

impl VideoFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
            width,
            height,
            device_id,
            timestamp: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// One still image produced by a successful capture request.
///
/// Immutable value: produced once, then owned by the caller. The payload is
/// a `Bytes` handle so it can be handed to a completion callback and a
/// waiting caller without copying pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedImage {
    pub id: Uuid,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
}

impl CapturedImage {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
            width,
            height,
            timestamp: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Camera device entry returned by enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDeviceInfo {
    pub id: String,
    pub name: String,
    /// Facing, when the backend can tell. Desktop webcams usually cannot.
    pub position: Option<CameraPosition>,
    pub is_available: bool,
}

impl CameraDeviceInfo {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            position: None,
            is_available: true,
        }
    }

    pub fn with_position(mut self, position: CameraPosition) -> Self {
        self.position = Some(position);
        self
    }
}
