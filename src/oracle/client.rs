//! Decision oracle client.
//!
//! Talks to an OpenAI-compatible chat completions endpoint (Gemini's
//! compatibility surface by default) through `curl`:
//! - One request per decision, no retries
//! - Optional PNG attachment sent as a base64 data URL
//! - The reply text must contain a JSON object, which is returned as-is
//!
//! # Configuration
//!
//! - `VISION_QA_ORACLE_ENDPOINT`: API endpoint URL
//! - `VISION_QA_ORACLE_MODEL`: Model name
//! - `VISION_QA_ORACLE_API_KEY` / `GEMINI_API_KEY`: Bearer credential
//! - `VISION_QA_ORACLE_MAX_TOKENS`: Max tokens in response
//! - `VISION_QA_ORACLE_CONNECT_TIMEOUT`: Connection timeout (seconds)

use base64::Engine;
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use super::extract::extract_json;
use crate::config::{self, OracleSettings};

/// Result type for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors that can occur while consulting the oracle
#[derive(Debug)]
pub enum OracleError {
    /// Failed to reach the endpoint, or the endpoint reported an error
    ConnectionFailed(String),
    /// The HTTP reply did not have the chat completions shape
    InvalidResponse(String),
    /// The reply text held no valid JSON object
    Parse(String),
    /// IO error
    Io(std::io::Error),
}

impl OracleError {
    /// Whether this is a malformed-payload failure rather than a transport one
    pub fn is_parse(&self) -> bool {
        matches!(self, OracleError::Parse(_))
    }
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            OracleError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            OracleError::Parse(msg) => write!(f, "Unparseable decision: {}", msg),
            OracleError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for OracleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OracleError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OracleError {
    fn from(e: std::io::Error) -> Self {
        OracleError::Io(e)
    }
}

/// Given a textual context and an optional image, return a structured decision.
pub trait DecisionOracle {
    fn decide(&mut self, prompt: &str, image: Option<&[u8]>) -> OracleResult<Value>;
}

impl<T: DecisionOracle + ?Sized> DecisionOracle for &mut T {
    fn decide(&mut self, prompt: &str, image: Option<&[u8]>) -> OracleResult<Value> {
        (**self).decide(prompt, image)
    }
}

/// Configuration for the oracle client
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name to use
    pub model: String,
    /// Bearer credential
    pub api_key: Option<String>,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Timeout for initial connection (seconds)
    pub connection_timeout: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::from_settings(&config::get().oracle)
    }
}

impl OracleConfig {
    pub fn from_settings(settings: &OracleSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            max_tokens: settings.max_tokens,
            connection_timeout: settings.connect_timeout,
        }
    }

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Oracle backed by a chat completions HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpOracle {
    config: OracleConfig,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// POST the request body and return the raw HTTP response body
    fn post(&self, body: &[u8]) -> OracleResult<Vec<u8>> {
        let mut cmd = Command::new("curl");
        cmd.args([
            "-sS",
            "-X",
            "POST",
            &self.config.endpoint,
            "-H",
            "Content-Type: application/json",
            "--data-binary",
            "@-",
            "--connect-timeout",
            &self.config.connection_timeout.to_string(),
        ]);
        if let Some(key) = &self.config.api_key {
            cmd.args(["-H", &format!("Authorization: Bearer {}", key)]);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OracleError::ConnectionFailed(format!("failed to spawn curl: {}", e)))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| OracleError::Io(std::io::Error::other("curl stdin was not piped")))?;
            stdin.write_all(body)?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OracleError::ConnectionFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

impl DecisionOracle for HttpOracle {
    #[instrument(skip_all, fields(model = %self.config.model, with_image = image.is_some()))]
    fn decide(&mut self, prompt: &str, image: Option<&[u8]>) -> OracleResult<Value> {
        let request = build_request(&self.config, prompt, image);
        let body = serde_json::to_vec(&request)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        info!(bytes = body.len(), "consulting decision oracle");
        let raw = self.post(&body)?;

        let response: Value = serde_json::from_slice(&raw)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        let text = reply_text(&response)?;
        debug!(reply = %text, "oracle reply");

        extract_json(&text).inspect_err(|e| warn!(error = %e, "oracle reply held no decision"))
    }
}

/// Build a chat completions request with an optional PNG attachment
pub fn build_request(config: &OracleConfig, prompt: &str, image: Option<&[u8]>) -> Value {
    let mut content = vec![serde_json::json!({
        "type": "text",
        "text": prompt
    })];
    if let Some(bytes) = image {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        content.push(serde_json::json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:image/png;base64,{}", encoded)
            }
        }));
    }

    serde_json::json!({
        "model": config.model,
        "messages": [{
            "role": "user",
            "content": content
        }],
        "max_tokens": config.max_tokens
    })
}

/// Pull the assistant text out of a chat completions response
pub fn reply_text(response: &Value) -> OracleResult<String> {
    if let Some(err) = response.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown error");
        return Err(OracleError::ConnectionFailed(message.to_string()));
    }

    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OracleError::InvalidResponse("missing choices[0].message.content".to_string()))
}

/// Check if the oracle endpoint is reachable (connection-only check).
///
/// Any HTTP status counts as reachable; no decision is requested.
pub fn check_reachable(endpoint: &str, timeout_secs: u64) -> OracleResult<bool> {
    let output = Command::new("curl")
        .args([
            "-s",
            "-o",
            "/dev/null",
            "-w",
            "%{http_code}",
            "--connect-timeout",
            &timeout_secs.to_string(),
            "--max-time",
            &timeout_secs.to_string(),
            "-I",
            endpoint,
        ])
        .output()?;

    let status = String::from_utf8_lossy(&output.stdout);
    // 000 means the connection failed entirely
    let code: u16 = status.trim().parse().unwrap_or(0);
    Ok(code > 0)
}
