//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for vision-qa, supporting:
//! - Environment variables for every tunable value
//! - Sensible defaults for a local emulator and the Obsidian app
//! - Fixed agent ceilings that no variable overrides
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `VISION_QA_ORACLE_ENDPOINT` | Chat completions endpoint | Gemini OpenAI-compatible URL |
//! | `VISION_QA_ORACLE_MODEL` | Decision model identifier | `gemini-2.5-flash` |
//! | `VISION_QA_ORACLE_API_KEY` | API credential (falls back to `GEMINI_API_KEY`) | unset |
//! | `VISION_QA_ORACLE_MAX_TOKENS` | Maximum tokens in an oracle reply | `1024` |
//! | `VISION_QA_ORACLE_CONNECT_TIMEOUT` | Oracle connection timeout in seconds | `10` |
//! | `VISION_QA_ADB_PATH` | Path to the adb binary | `adb` |
//! | `VISION_QA_DEVICE_SERIAL` | Serial passed as `adb -s` | unset |
//! | `VISION_QA_DEVICE_MATCH` | Substring a connected serial must contain | `emulator` |
//! | `VISION_QA_DEVICE_TIMEOUT` | Per-command device timeout in seconds | `30` |
//! | `VISION_QA_APP_PACKAGE` | Package launched by `launch_app` | `md.obsidian` |
//! | `VISION_QA_SCREENSHOT_DIR` | Base directory for captured frames | `screenshots` |
//! | `VISION_QA_LOG_DIR` | Directory for run reports | `logs` |
//! | `VISION_QA_STEP_BUDGET` | Steps per test case | `12` |
//!
//! # Example
//!
//! ```bash
//! export VISION_QA_ORACLE_API_KEY="..."
//! export VISION_QA_ADB_PATH="$HOME/Library/Android/sdk/platform-tools/adb"
//! export VISION_QA_STEP_BUDGET=20
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default oracle endpoint (Gemini's OpenAI-compatible surface)
pub const DEFAULT_ORACLE_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

/// Default oracle model
pub const DEFAULT_ORACLE_MODEL: &str = "gemini-2.5-flash";

/// Default max tokens for oracle replies
pub const DEFAULT_ORACLE_MAX_TOKENS: u32 = 1024;

/// Default oracle connection timeout (seconds)
pub const DEFAULT_ORACLE_CONNECT_TIMEOUT: u64 = 10;

/// Default adb binary (resolved through PATH)
pub const DEFAULT_ADB_PATH: &str = "adb";

/// Default substring a connected device serial must contain
pub const DEFAULT_DEVICE_MATCH: &str = "emulator";

/// Default per-command device timeout (seconds)
pub const DEFAULT_DEVICE_TIMEOUT: u64 = 30;

/// Default application under test
pub const DEFAULT_APP_PACKAGE: &str = "md.obsidian";

/// Default screenshot base directory
pub const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Default run report directory
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default number of steps per test case
pub const DEFAULT_STEP_BUDGET: u32 = 12;

// ============================================================================
// Fixed Agent Ceilings
// ============================================================================

/// Hard ceiling on decision oracle calls per test case
pub const ORACLE_CALL_BUDGET: u32 = 10;

/// Consecutive no-change steps after which a run fails
pub const STAGNATION_CEILING: u32 = 5;

/// Pause between a device action and the "after" capture
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Swipe duration used when the oracle omits one (milliseconds)
pub const DEFAULT_SWIPE_MS: u32 = 300;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_ORACLE_ENDPOINT: &str = "VISION_QA_ORACLE_ENDPOINT";
pub const ENV_ORACLE_MODEL: &str = "VISION_QA_ORACLE_MODEL";
pub const ENV_ORACLE_API_KEY: &str = "VISION_QA_ORACLE_API_KEY";
pub const ENV_ORACLE_MAX_TOKENS: &str = "VISION_QA_ORACLE_MAX_TOKENS";
pub const ENV_ORACLE_CONNECT_TIMEOUT: &str = "VISION_QA_ORACLE_CONNECT_TIMEOUT";
pub const ENV_ADB_PATH: &str = "VISION_QA_ADB_PATH";
pub const ENV_DEVICE_SERIAL: &str = "VISION_QA_DEVICE_SERIAL";
pub const ENV_DEVICE_MATCH: &str = "VISION_QA_DEVICE_MATCH";
pub const ENV_DEVICE_TIMEOUT: &str = "VISION_QA_DEVICE_TIMEOUT";
pub const ENV_APP_PACKAGE: &str = "VISION_QA_APP_PACKAGE";
pub const ENV_SCREENSHOT_DIR: &str = "VISION_QA_SCREENSHOT_DIR";
pub const ENV_LOG_DIR: &str = "VISION_QA_LOG_DIR";
pub const ENV_STEP_BUDGET: &str = "VISION_QA_STEP_BUDGET";

/// Legacy credential variable, still honoured when the prefixed one is unset
pub const ENV_ORACLE_API_KEY_LEGACY: &str = "GEMINI_API_KEY";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for vision-qa
#[derive(Debug, Clone)]
pub struct Config {
    pub oracle: OracleSettings,
    pub device: DeviceSettings,
    pub paths: PathSettings,
    pub agent: AgentSettings,
}

/// Decision oracle settings
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Bearer credential
    pub api_key: Option<String>,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
}

/// Device transport settings
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub adb_path: PathBuf,
    pub serial: Option<String>,
    pub device_match: String,
    pub command_timeout: Duration,
    pub app_package: String,
}

/// Output locations
#[derive(Debug, Clone)]
pub struct PathSettings {
    pub screenshot_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Agent loop budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub step_budget: u32,
    pub oracle_budget: u32,
    pub stagnation_ceiling: u32,
    pub settle_delay: Duration,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            oracle: OracleSettings {
                endpoint: string(ENV_ORACLE_ENDPOINT, DEFAULT_ORACLE_ENDPOINT),
                model: string(ENV_ORACLE_MODEL, DEFAULT_ORACLE_MODEL),
                api_key: non_empty(ENV_ORACLE_API_KEY)
                    .or_else(|| non_empty(ENV_ORACLE_API_KEY_LEGACY)),
                max_tokens: parse_or(lookup(ENV_ORACLE_MAX_TOKENS), DEFAULT_ORACLE_MAX_TOKENS),
                connect_timeout: parse_or(
                    lookup(ENV_ORACLE_CONNECT_TIMEOUT),
                    DEFAULT_ORACLE_CONNECT_TIMEOUT,
                ),
            },
            device: DeviceSettings {
                adb_path: PathBuf::from(string(ENV_ADB_PATH, DEFAULT_ADB_PATH)),
                serial: non_empty(ENV_DEVICE_SERIAL),
                device_match: string(ENV_DEVICE_MATCH, DEFAULT_DEVICE_MATCH),
                command_timeout: Duration::from_secs(parse_or(
                    lookup(ENV_DEVICE_TIMEOUT),
                    DEFAULT_DEVICE_TIMEOUT,
                )),
                app_package: string(ENV_APP_PACKAGE, DEFAULT_APP_PACKAGE),
            },
            paths: PathSettings {
                screenshot_dir: PathBuf::from(string(ENV_SCREENSHOT_DIR, DEFAULT_SCREENSHOT_DIR)),
                log_dir: PathBuf::from(string(ENV_LOG_DIR, DEFAULT_LOG_DIR)),
            },
            agent: AgentSettings {
                step_budget: parse_or(lookup(ENV_STEP_BUDGET), DEFAULT_STEP_BUDGET).max(1),
                ..AgentSettings::defaults()
            },
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AgentSettings {
    pub fn defaults() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            oracle_budget: ORACLE_CALL_BUDGET,
            stagnation_ceiling: STAGNATION_CEILING,
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// Get the configured step budget (convenience function)
pub fn step_budget() -> u32 {
    get().agent.step_budget
}

/// Get the configured application package (convenience function)
pub fn app_package() -> String {
    get().device.app_package.clone()
}
