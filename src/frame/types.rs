// Core types for frame capture and comparison

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::device::DeviceError;

/// A captured device frame stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRef {
    /// Path to the PNG file
    pub path: PathBuf,

    /// Label the frame was captured under (e.g. "before", "step_3")
    pub label: String,

    /// Timestamp when the frame was captured
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl FrameRef {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            captured_at: Utc::now(),
        }
    }
}

/// Frames taken around a single device action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePair {
    pub before: FrameRef,
    pub after: FrameRef,
}

/// Result type for frame operations
pub type FrameResult<T> = Result<T, FrameError>;

/// Error types for frame operations
#[derive(Debug)]
pub enum FrameError {
    /// Error during the capture process
    Capture(String),

    /// A frame could not be decoded as an image
    Decode(String),

    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Capture(msg) => write!(f, "Capture error: {}", msg),
            FrameError::Decode(msg) => write!(f, "Decode error: {}", msg),
            FrameError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err)
    }
}

impl From<image::ImageError> for FrameError {
    fn from(err: image::ImageError) -> Self {
        FrameError::Decode(err.to_string())
    }
}

impl From<DeviceError> for FrameError {
    fn from(err: DeviceError) -> Self {
        FrameError::Capture(err.to_string())
    }
}

/// Capturing frames and telling whether two of them differ.
pub trait VisualDiff {
    /// Capture the current screen under `label`
    fn capture(&mut self, label: &str) -> FrameResult<FrameRef>;

    /// Whether two frames differ visibly
    fn differ(&self, a: &FrameRef, b: &FrameRef) -> FrameResult<bool>;

    /// Raw encoded bytes of a frame, for attaching to an oracle request
    fn frame_bytes(&self, frame: &FrameRef) -> FrameResult<Vec<u8>> {
        Ok(fs::read(&frame.path)?)
    }
}

impl<T: VisualDiff + ?Sized> VisualDiff for &mut T {
    fn capture(&mut self, label: &str) -> FrameResult<FrameRef> {
        (**self).capture(label)
    }

    fn differ(&self, a: &FrameRef, b: &FrameRef) -> FrameResult<bool> {
        (**self).differ(a, b)
    }

    fn frame_bytes(&self, frame: &FrameRef) -> FrameResult<Vec<u8>> {
        (**self).frame_bytes(frame)
    }
}
