//! Vision QA - natural-language mobile UI testing driven by a vision model.
//!
//! This crate provides:
//! - A plan / execute / supervise control loop over one test case
//! - adb-based device control and screen capture
//! - Pixel-level frame diffing and synthetic frame rendering
//! - A chat-completions decision oracle client
//! - Per-case frame sessions and JSON run reports
//!
//! # Example
//!
//! ```rust,no_run
//! use vision_qa::agent::RunController;
//! use vision_qa::config;
//! use vision_qa::device::{AdbConfig, AdbDevice};
//! use vision_qa::frame::AdbScreenshots;
//! use vision_qa::oracle::{HttpOracle, OracleConfig};
//!
//! let device = AdbDevice::new(AdbConfig::default());
//! let frames = AdbScreenshots::new(device.clone(), "./screenshots");
//! let oracle = HttpOracle::new(OracleConfig::default());
//! let mut controller = RunController::new(device, frames, oracle, config::get().agent, "md.obsidian");
//!
//! let state = controller.run("Open Obsidian and create a vault named 'InternVault'", 12);
//! println!("{} after {} steps", state.outcome(), state.step());
//! ```

pub mod agent;
pub mod config;
pub mod device;
pub mod frame;
pub mod harness;
pub mod logging;
pub mod oracle;
pub mod runner;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export the control loop
pub use agent::{
    Action, ExecutionResult, FailureCause, FailureKind, Judgment, PlannedAction, RunController, RunOutcome,
    RunState, Verdict,
};

// Re-export collaborator seams
pub use device::{AdbDevice, DeviceControl, DeviceError};
pub use frame::{AdbScreenshots, FrameError, FrameRef, VisualDiff};
pub use oracle::{DecisionOracle, HttpOracle, OracleError};

// Re-export reports and harness
pub use harness::{HarnessError, HarnessResult, TestCase};
pub use runner::{RunReport, StepRecord};
pub use session::{Session, cleanup_old_sessions, list_sessions};
