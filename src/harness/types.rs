use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::agent::Verdict;
use crate::config;

/// A natural-language test case and the verdict it should reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// What the agent should do and check
    pub description: String,

    /// Verdict the run is expected to reach (pass or fail)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Verdict>,
}

impl TestCase {
    pub fn new(description: impl Into<String>, expected: Option<Verdict>) -> Self {
        Self {
            description: description.into(),
            expected,
        }
    }
}

/// Configuration for a suite run
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Steps allowed per test case
    pub step_budget: u32,

    /// Base directory for per-case frame sessions
    pub screenshot_dir: PathBuf,

    /// Directory where run reports are written
    pub log_dir: PathBuf,

    /// Keep frames after each case finishes
    pub keep_frames: bool,

    /// Package launched by `launch_app`
    pub app_package: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            step_budget: config::step_budget(),
            screenshot_dir: cfg.paths.screenshot_dir.clone(),
            log_dir: cfg.paths.log_dir.clone(),
            keep_frames: true,
            app_package: config::app_package(),
        }
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error types for harness operations
#[derive(Debug)]
pub enum HarnessError {
    /// The case list is empty or malformed
    Cases(String),

    /// Report or case file (de)serialization failed
    Serialization(serde_json::Error),

    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarnessError::Cases(msg) => write!(f, "Test case error: {}", msg),
            HarnessError::Serialization(err) => write!(f, "Serialization error: {}", err),
            HarnessError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarnessError::Cases(_) => None,
            HarnessError::Serialization(err) => Some(err),
            HarnessError::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::Io(err)
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Serialization(err)
    }
}
