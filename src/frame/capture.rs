//! Screen capture over adb.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use super::diff::frames_differ;
use super::types::{FrameRef, FrameResult, VisualDiff};
use crate::device::AdbDevice;

/// Generate a timestamp suffix with millisecond resolution
pub fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S%3f").to_string()
}

/// Generate a filename for a frame
pub fn generate_filename(label: &str, timestamp: &str) -> String {
    format!("{}_{}.png", sanitize_label(label), timestamp)
}

/// Sanitize a label for use in device and host filenames
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Captures frames with `screencap` and pulls them into a host directory.
#[derive(Debug, Clone)]
pub struct AdbScreenshots {
    device: AdbDevice,
    output_dir: PathBuf,
}

impl AdbScreenshots {
    pub fn new(device: AdbDevice, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            device,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl VisualDiff for AdbScreenshots {
    #[instrument(skip(self), fields(dir = %self.output_dir.display()))]
    fn capture(&mut self, label: &str) -> FrameResult<FrameRef> {
        fs::create_dir_all(&self.output_dir)?;

        let filename = generate_filename(label, &generate_timestamp());
        let remote = format!("/sdcard/{}", filename);
        let local = self.output_dir.join(&filename);
        let local_str = local.to_string_lossy().to_string();

        self.device.run(&["shell", "screencap", "-p", remote.as_str()])?;
        self.device.run(&["pull", remote.as_str(), local_str.as_str()])?;
        if let Err(e) = self.device.run(&["shell", "rm", remote.as_str()]) {
            // Best effort; the frame is already on the host.
            warn!(remote = %remote, error = %e, "failed to remove device screenshot");
        }

        debug!(path = %local.display(), "captured frame");
        Ok(FrameRef::new(local, label))
    }

    fn differ(&self, a: &FrameRef, b: &FrameRef) -> FrameResult<bool> {
        frames_differ(&a.path, &b.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("step_3"), "step_3");
        assert_eq!(sanitize_label("before action"), "before_action");
        assert_eq!(sanitize_label("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_generate_filename() {
        assert_eq!(generate_filename("after", "20260101_120000123"), "after_20260101_120000123.png");
    }
}
