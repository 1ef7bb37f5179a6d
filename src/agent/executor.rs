//! Action Executor: dispatches one action to the device and reports what the
//! screen did.

use std::thread;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::action::{Action, PlannedAction};
use super::outcome::{ExecutionResult, FailureCause, TerminalSignal};
use crate::config::{AgentSettings, SETTLE_DELAY};
use crate::device::{DeviceControl, DeviceError, DeviceResult};
use crate::frame::{FramePair, VisualDiff};

#[derive(Debug, Clone)]
pub struct Executor {
    settle: Duration,
    package_id: String,
}

impl Executor {
    pub fn new(package_id: impl Into<String>) -> Self {
        Self {
            settle: SETTLE_DELAY,
            package_id: package_id.into(),
        }
    }

    pub fn from_settings(settings: &AgentSettings, package_id: impl Into<String>) -> Self {
        Self::new(package_id).settle(settings.settle_delay)
    }

    /// Wait between dispatching an action and capturing the after-frame
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Run `planned` against the device.
    ///
    /// Terminal signals pass through without touching the device. Anything
    /// else requires a connected device, is framed by before/after captures
    /// and is reported as failed rather than raised.
    #[instrument(skip_all, fields(action = planned.action.name()))]
    pub fn execute<D, V>(&self, planned: &PlannedAction, device: &D, frames: &mut V) -> ExecutionResult
    where
        D: DeviceControl,
        V: VisualDiff,
    {
        match planned.action {
            Action::Done => return ExecutionResult::signaled(TerminalSignal::Done),
            Action::CannotFind => return ExecutionResult::signaled(TerminalSignal::CannotFind),
            _ => {}
        }

        match device.is_connected() {
            Ok(true) => {}
            Ok(false) => {
                warn!("no device connected");
                return ExecutionResult::failed(FailureCause::Connectivity, "No device connected");
            }
            Err(e) => {
                warn!(error = %e, "device connectivity check failed");
                return ExecutionResult::failed(FailureCause::Connectivity, e.to_string());
            }
        }

        let before = match frames.capture("before") {
            Ok(frame) => frame,
            Err(e) => {
                return ExecutionResult::failed(
                    FailureCause::FrameCapture,
                    format!("Before-frame capture failed: {}", e),
                );
            }
        };

        if let Err(e) = self.dispatch(&planned.action, device) {
            warn!(error = %e, "device command failed");
            let cause = match e {
                DeviceError::Unreachable(_) => FailureCause::Connectivity,
                _ => FailureCause::Transport,
            };
            return ExecutionResult::failed(cause, e.to_string());
        }

        thread::sleep(self.settle);

        let after = match frames.capture("after") {
            Ok(frame) => frame,
            Err(e) => {
                return ExecutionResult::failed(
                    FailureCause::FrameCapture,
                    format!("After-frame capture failed: {}", e),
                );
            }
        };

        match frames.differ(&before, &after) {
            Ok(changed) => {
                info!(changed, "action executed");
                ExecutionResult::executed(FramePair { before, after }, changed)
            }
            Err(e) => ExecutionResult::failed(
                FailureCause::FrameCapture,
                format!("Frame comparison failed: {}", e),
            ),
        }
    }

    fn dispatch<D: DeviceControl>(&self, action: &Action, device: &D) -> DeviceResult<()> {
        match action {
            Action::Tap { x, y } => device.tap(*x, *y),
            Action::TypeText { text } => device.type_text(text),
            Action::KeyEvent { code } => device.keyevent(*code),
            Action::Swipe(g) => device.swipe(g.x1, g.y1, g.x2, g.y2, g.ms),
            Action::LaunchApp => device.launch(&self.package_id),
            // Intercepted before dispatch
            Action::Done | Action::CannotFind => Ok(()),
        }
    }
}
