//! Android Debug Bridge transport.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::process::{CommandOutput, run_with_timeout};
use super::types::{DeviceControl, DeviceError, DeviceResult, has_online_device};
use crate::config::{self, DeviceSettings};

/// Configuration for the adb transport
#[derive(Debug, Clone)]
pub struct AdbConfig {
    /// Path to the adb binary
    pub adb_path: PathBuf,
    /// Target serial (`adb -s`), if more than one device is attached
    pub serial: Option<String>,
    /// Substring an online serial must contain to count as connected
    pub device_match: String,
    /// Per-command timeout
    pub timeout: Duration,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self::from_settings(&config::get().device)
    }
}

impl AdbConfig {
    pub fn from_settings(settings: &DeviceSettings) -> Self {
        Self {
            adb_path: settings.adb_path.clone(),
            serial: settings.serial.clone(),
            device_match: settings.device_match.clone(),
            timeout: settings.command_timeout,
        }
    }

    pub fn new(adb_path: impl Into<PathBuf>) -> Self {
        Self {
            adb_path: adb_path.into(),
            ..Default::default()
        }
    }

    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn device_match(mut self, pattern: impl Into<String>) -> Self {
        self.device_match = pattern.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A device reached through the `adb` command-line tool.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    config: AdbConfig,
}

impl AdbDevice {
    pub fn new(config: AdbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdbConfig {
        &self.config
    }

    /// Run `adb [-s serial] <args>` and fail on non-zero exit or timeout.
    pub fn run(&self, args: &[&str]) -> DeviceResult<CommandOutput> {
        let mut cmd = Command::new(&self.config.adb_path);
        if let Some(serial) = &self.config.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);

        let rendered = args.join(" ");
        let output = run_with_timeout(cmd, self.config.timeout)
            .map_err(|e| DeviceError::transport(&rendered, format!("failed to spawn adb: {}", e)))?;

        if !output.success() {
            let detail = output.failure_detail(self.config.timeout);
            warn!(command = %rendered, %detail, "adb command failed");
            return Err(DeviceError::transport(rendered, detail));
        }
        debug!(command = %rendered, "adb command ok");
        Ok(output)
    }

    /// Run `adb shell input <args>`.
    fn input(&self, args: &[&str]) -> DeviceResult<()> {
        let mut full = vec!["shell", "input"];
        full.extend_from_slice(args);
        self.run(&full).map(|_| ())
    }
}

impl DeviceControl for AdbDevice {
    fn list_devices(&self) -> DeviceResult<String> {
        // The listing ignores `-s`, so bypass `run`.
        let mut cmd = Command::new(&self.config.adb_path);
        cmd.arg("devices");
        let output = run_with_timeout(cmd, self.config.timeout)
            .map_err(|e| DeviceError::Unreachable(format!("failed to spawn adb: {}", e)))?;
        if !output.success() {
            return Err(DeviceError::Unreachable(
                output.failure_detail(self.config.timeout),
            ));
        }
        Ok(output.stdout_lossy())
    }

    #[instrument(skip(self))]
    fn is_connected(&self) -> DeviceResult<bool> {
        let listing = self.list_devices()?;
        let pattern = self
            .config
            .serial
            .as_deref()
            .unwrap_or(self.config.device_match.as_str());
        Ok(has_online_device(&listing, pattern))
    }

    fn tap(&self, x: i32, y: i32) -> DeviceResult<()> {
        self.input(&["tap", x.to_string().as_str(), y.to_string().as_str()])
    }

    fn type_text(&self, text: &str) -> DeviceResult<()> {
        self.input(&["text", encode_input_text(text).as_str()])
    }

    fn keyevent(&self, code: u32) -> DeviceResult<()> {
        self.input(&["keyevent", code.to_string().as_str()])
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> DeviceResult<()> {
        self.input(&[
            "swipe",
            x1.to_string().as_str(),
            y1.to_string().as_str(),
            x2.to_string().as_str(),
            y2.to_string().as_str(),
            duration_ms.to_string().as_str(),
        ])
    }

    fn launch(&self, package_id: &str) -> DeviceResult<()> {
        self.run(&[
            "shell",
            "monkey",
            "-p",
            package_id,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .map(|_| ())
    }
}

/// `input text` treats a space as an argument separator; `%s` is its escape.
pub fn encode_input_text(text: &str) -> String {
    text.replace(' ', "%s")
}
