//! Session management for per-test-case artifacts.
//!
//! Each test case gets its own session:
//! - A unique frame directory under the screenshot base
//! - A JSON report written under the log directory
//! - Cleanup of the frame directory on drop unless kept

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::runner::RunReport;

/// Artifact layout for one test-case run
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Directory holding this run's frames
    pub dir: PathBuf,
    /// Whether to keep frames after the session ends
    pub keep: bool,
    /// Test case this session records
    pub test_case: Option<String>,
}

impl Session {
    /// Create a session named after `name` under `base`. Frames are kept by default.
    pub fn with_name(base: impl AsRef<Path>, name: &str) -> Self {
        let id = format!("{}_{}", sanitize_name(name), generate_timestamp_suffix());
        let dir = base.as_ref().join(&id);

        Self {
            id,
            dir,
            keep: true,
            test_case: None,
        }
    }

    /// Session for the `index`-th case of a suite (1-based)
    pub fn for_case(base: impl AsRef<Path>, index: usize, test_case: &str) -> Self {
        let slug: String = sanitize_name(test_case).chars().take(40).collect();
        let mut session = Self::with_name(base, &format!("case{}_{}", index, slug));
        session.test_case = Some(test_case.to_string());
        session
    }

    /// Set whether to keep frames after session ends
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Create the frame directory and write session metadata
    pub fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "test_case": self.test_case,
        });

        let metadata_path = self.dir.join(".session.json");
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    /// Where this session's report goes under `log_dir`
    pub fn report_path(&self, log_dir: impl AsRef<Path>) -> PathBuf {
        log_dir.as_ref().join(format!("{}.json", self.id))
    }

    /// Write `report` as pretty JSON under `log_dir` and return its path
    pub fn write_report(&self, log_dir: impl AsRef<Path>, report: &RunReport) -> io::Result<PathBuf> {
        fs::create_dir_all(log_dir.as_ref())?;
        let path = self.report_path(log_dir);
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }

    /// List all PNG frames in the session
    pub fn list_frames(&self) -> io::Result<Vec<PathBuf>> {
        let mut frames = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let path = entry?.path();
                if path.extension().map(|e| e == "png").unwrap_or(false) {
                    frames.push(path);
                }
            }
        }
        frames.sort();
        Ok(frames)
    }

    /// Remove the frame directory unless kept
    pub fn cleanup(&self) -> io::Result<()> {
        if self.dir.exists() && !self.keep {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

fn generate_timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S%3f").to_string()
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Remove session directories under `base` older than `max_age`
pub fn cleanup_old_sessions(base: impl AsRef<Path>, max_age: Duration) -> io::Result<usize> {
    let base = base.as_ref();
    if !base.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;

    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if let Some(age) = age {
            if age > max_age && fs::remove_dir_all(&path).is_ok() {
                cleaned += 1;
            }
        }
    }

    Ok(cleaned)
}

/// List all session directories under `base`
pub fn list_sessions(base: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let base = base.as_ref();
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base)? {
        let path = entry?.path();
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}
