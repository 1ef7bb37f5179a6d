//! Scripted stand-ins for the device, the frame source and the decision oracle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::device::{DeviceControl, DeviceError, DeviceResult};
use crate::frame::{FrameError, FrameRef, FrameResult, ScreenCanvas, VisualDiff, frames_differ};
use crate::oracle::{DecisionOracle, OracleError, OracleResult};

/// Device that records every call and never touches hardware.
#[derive(Debug, Default)]
pub struct FakeDevice {
    connected: bool,
    unreachable: bool,
    failing: Option<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeDevice {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connectivity checks fail with a transport-level error
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Commands whose first word is `name` fail with a transport error
    pub fn fail_command(mut self, name: &str) -> Self {
        self.failing = Some(name.to_string());
        self
    }

    /// Every call so far, e.g. `"is_connected"`, `"tap 540 1200"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls that would have changed the device
    pub fn dispatched(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c != "is_connected" && c != "devices")
            .collect()
    }

    fn record(&self, call: String) -> DeviceResult<()> {
        let fails = self
            .failing
            .as_deref()
            .is_some_and(|name| call.split(' ').next() == Some(name));
        self.calls.borrow_mut().push(call.clone());
        if fails {
            Err(DeviceError::transport(call, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

impl DeviceControl for FakeDevice {
    fn list_devices(&self) -> DeviceResult<String> {
        self.calls.borrow_mut().push("devices".to_string());
        if self.connected {
            Ok("List of devices attached\nemulator-5554\tdevice\n".to_string())
        } else {
            Ok("List of devices attached\n".to_string())
        }
    }

    fn is_connected(&self) -> DeviceResult<bool> {
        self.calls.borrow_mut().push("is_connected".to_string());
        if self.unreachable {
            return Err(DeviceError::Unreachable("adb server not running".to_string()));
        }
        Ok(self.connected)
    }

    fn tap(&self, x: i32, y: i32) -> DeviceResult<()> {
        self.record(format!("tap {} {}", x, y))
    }

    fn type_text(&self, text: &str) -> DeviceResult<()> {
        self.record(format!("text {}", text))
    }

    fn keyevent(&self, code: u32) -> DeviceResult<()> {
        self.record(format!("keyevent {}", code))
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> DeviceResult<()> {
        self.record(format!("swipe {} {} {} {} {}", x1, y1, x2, y2, duration_ms))
    }

    fn launch(&self, package_id: &str) -> DeviceResult<()> {
        self.record(format!("launch {}", package_id))
    }
}

/// Frame source with scripted diff answers and no files on disk.
///
/// `differ` pops the next scripted answer and falls back to the default
/// (changed) once the script runs out.
#[derive(Debug)]
pub struct ScriptedFrames {
    changes: RefCell<VecDeque<bool>>,
    default_change: bool,
    fail_captures: bool,
    captures: Vec<String>,
}

impl Default for ScriptedFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFrames {
    pub fn new() -> Self {
        Self {
            changes: RefCell::new(VecDeque::new()),
            default_change: true,
            fail_captures: false,
            captures: Vec::new(),
        }
    }

    pub fn changes(self, changes: impl IntoIterator<Item = bool>) -> Self {
        self.changes.borrow_mut().extend(changes);
        self
    }

    /// Report "no change" whenever the script is empty
    pub fn frozen(mut self) -> Self {
        self.default_change = false;
        self
    }

    pub fn fail_captures(mut self) -> Self {
        self.fail_captures = true;
        self
    }

    /// Labels of every capture so far
    pub fn captures(&self) -> Vec<String> {
        self.captures.clone()
    }
}

impl VisualDiff for ScriptedFrames {
    fn capture(&mut self, label: &str) -> FrameResult<FrameRef> {
        if self.fail_captures {
            return Err(FrameError::Capture("scripted capture failure".to_string()));
        }
        self.captures.push(label.to_string());
        let path = PathBuf::from(format!("/virtual/{}_{}.png", self.captures.len(), label));
        Ok(FrameRef::new(path, label))
    }

    fn differ(&self, _a: &FrameRef, _b: &FrameRef) -> FrameResult<bool> {
        Ok(self.changes.borrow_mut().pop_front().unwrap_or(self.default_change))
    }

    fn frame_bytes(&self, frame: &FrameRef) -> FrameResult<Vec<u8>> {
        Ok(format!("frame:{}", frame.path.display()).into_bytes())
    }
}

/// Frame source that writes real PNGs into a temporary directory.
///
/// The screen advances to the next queued canvas on each `after` capture,
/// i.e. once per dispatched action, and stays put when the queue is empty.
/// Diffing uses the real pixel comparison.
#[derive(Debug)]
pub struct CanvasFrames {
    dir: TempDir,
    screens: VecDeque<ScreenCanvas>,
    current: ScreenCanvas,
    count: usize,
}

impl CanvasFrames {
    pub fn new(initial: ScreenCanvas) -> FrameResult<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            screens: VecDeque::new(),
            current: initial,
            count: 0,
        })
    }

    pub fn then(mut self, screen: ScreenCanvas) -> Self {
        self.screens.push_back(screen);
        self
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl VisualDiff for CanvasFrames {
    fn capture(&mut self, label: &str) -> FrameResult<FrameRef> {
        if label == "after" {
            if let Some(next) = self.screens.pop_front() {
                self.current = next;
            }
        }
        self.count += 1;
        let path = self.dir.path().join(format!("{:03}_{}.png", self.count, label));
        self.current.save(&path)?;
        Ok(FrameRef::new(path, label))
    }

    fn differ(&self, a: &FrameRef, b: &FrameRef) -> FrameResult<bool> {
        frames_differ(&a.path, &b.path)
    }
}

/// Oracle that answers from a queue and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: VecDeque<OracleResult<Value>>,
    prompts: Vec<String>,
    images: Vec<bool>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, value: Value) -> Self {
        self.replies.push_back(Ok(value));
        self
    }

    pub fn replies(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.replies.extend(values.into_iter().map(Ok));
        self
    }

    pub fn fail(mut self, err: OracleError) -> Self {
        self.replies.push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.len()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Whether the `index`-th call carried an image
    pub fn saw_image(&self, index: usize) -> bool {
        self.images.get(index).copied().unwrap_or(false)
    }
}

impl DecisionOracle for ScriptedOracle {
    fn decide(&mut self, prompt: &str, image: Option<&[u8]>) -> OracleResult<Value> {
        self.prompts.push(prompt.to_string());
        self.images.push(image.is_some());
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::ConnectionFailed("oracle script exhausted".to_string())))
    }
}

/// Planner reply for `action` with no parameters
pub fn decision(action: &str, why: &str) -> Value {
    json!({"action": action, "x": null, "y": null, "text": null, "why": why})
}

/// Planner reply tapping at `(x, y)`
pub fn tap_decision(x: i32, y: i32, why: &str) -> Value {
    json!({"action": "tap", "x": x, "y": y, "text": null, "why": why})
}

/// Supervisor reply with `is_complete` consistent with the verdict
pub fn judgment_reply(verdict: &str, failure_type: Option<&str>, notes: &str) -> Value {
    json!({
        "verdict": verdict,
        "failure_type": failure_type,
        "notes": notes,
        "is_complete": verdict != "incomplete",
    })
}
