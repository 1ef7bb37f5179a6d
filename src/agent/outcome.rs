// Execution results and supervisor judgments

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::FramePair;
use crate::oracle::{OracleError, OracleResult};

/// Why an execution result is unsuccessful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// No matching device was online
    Connectivity,
    /// The device rejected or failed to run a command
    Transport,
    /// The planner produced an action outside the vocabulary
    ContractViolation,
    /// A frame could not be captured, read or compared
    FrameCapture,
    /// The oracle reply held no usable payload
    OracleParse,
    /// The oracle could not be reached
    OracleUnavailable,
}

/// Terminal signal carried through execution without touching the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalSignal {
    Done,
    CannotFind,
}

/// Outcome of executing a single planned action.
///
/// An unsuccessful result never reports a visible change; the constructors
/// are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    success: bool,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal: Option<TerminalSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<FramePair>,
    visible_change: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<FailureCause>,
}

impl ExecutionResult {
    pub fn failed(cause: FailureCause, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            signal: None,
            frames: None,
            visible_change: false,
            cause: Some(cause),
        }
    }

    /// A terminal signal passed through: no device command, no frames
    pub fn signaled(signal: TerminalSignal) -> Self {
        let reason = match signal {
            TerminalSignal::Done => "Planner signaled done",
            TerminalSignal::CannotFind => "Planner could not find the target",
        };
        Self {
            success: true,
            reason: reason.to_string(),
            signal: Some(signal),
            frames: None,
            visible_change: false,
            cause: None,
        }
    }

    /// A dispatched command with its surrounding frames
    pub fn executed(frames: FramePair, visible_change: bool) -> Self {
        let reason = if visible_change {
            "Action executed; UI changed"
        } else {
            "Action executed; no visible change"
        };
        Self {
            success: true,
            reason: reason.to_string(),
            signal: None,
            frames: Some(frames),
            visible_change,
            cause: None,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn signal(&self) -> Option<TerminalSignal> {
        self.signal
    }

    pub fn frames(&self) -> Option<&FramePair> {
        self.frames.as_ref()
    }

    pub fn visible_change(&self) -> bool {
        self.visible_change
    }

    pub fn cause(&self) -> Option<FailureCause> {
        self.cause
    }
}

/// Supervisor verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Incomplete,
}

impl Verdict {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Verdict::Pass),
            "fail" => Some(Verdict::Fail),
            "incomplete" => Some(Verdict::Incomplete),
            _ => None,
        }
    }

    /// Pass and fail end the run
    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Incomplete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Incomplete => "incomplete",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a failed verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The tooling failed or the target could not be reached
    ExecutionFailure,
    /// The steps ran but the expected condition does not hold
    AssertionFailure,
}

impl FailureKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "execution_failure" => Some(FailureKind::ExecutionFailure),
            "assertion_failure" => Some(FailureKind::AssertionFailure),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ExecutionFailure => "execution_failure",
            FailureKind::AssertionFailure => "assertion_failure",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Places where a judgment departs from what the oracle literally said
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JudgmentFlag {
    /// `is_complete` disagreed with the verdict and was overridden
    CompletionCoerced { reported: bool },
    /// A fail verdict without a failure type was read as an assertion failure
    MissingFailureType,
    /// The run resolved on a step the planner had not declared done
    ResolvedWithoutDone,
    /// No oracle budget was left to judge this step
    OracleBudgetExhausted,
}

/// A supervisor decision for one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Judgment {
    verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    notes: String,
    complete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    flags: Vec<JudgmentFlag>,
}

impl Judgment {
    /// Build a judgment; completion follows the verdict and a failure kind
    /// is only kept for fail verdicts.
    pub fn new(verdict: Verdict, failure: Option<FailureKind>, notes: impl Into<String>) -> Self {
        Self {
            verdict,
            failure: if verdict == Verdict::Fail { failure } else { None },
            notes: notes.into(),
            complete: verdict.is_terminal(),
            flags: Vec::new(),
        }
    }

    pub fn execution_failure(notes: impl Into<String>) -> Self {
        Self::new(Verdict::Fail, Some(FailureKind::ExecutionFailure), notes)
    }

    pub fn incomplete(notes: impl Into<String>) -> Self {
        Self::new(Verdict::Incomplete, None, notes)
    }

    pub fn with_flag(mut self, flag: JudgmentFlag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Read a supervisor reply from the oracle.
    ///
    /// An unrecognised verdict is a parse error. `is_complete` is derived
    /// from the verdict and any disagreement is flagged.
    pub fn from_oracle(value: &Value) -> OracleResult<Self> {
        let raw: RawJudgment = serde_json::from_value(value.clone())
            .map_err(|e| OracleError::Parse(format!("judgment shape: {}", e)))?;

        let verdict = Verdict::parse(&raw.verdict)
            .ok_or_else(|| OracleError::Parse(format!("unknown verdict '{}'", raw.verdict)))?;
        let mut failure = raw.failure_type.as_deref().and_then(FailureKind::parse);

        let mut flags = Vec::new();
        if verdict == Verdict::Fail && failure.is_none() {
            failure = Some(FailureKind::AssertionFailure);
            flags.push(JudgmentFlag::MissingFailureType);
        }
        match raw.is_complete {
            Some(reported) if reported != verdict.is_terminal() => {
                flags.push(JudgmentFlag::CompletionCoerced { reported });
            }
            _ => {}
        }

        let mut judgment = Judgment::new(verdict, failure, raw.notes.unwrap_or_default());
        judgment.flags = flags;
        Ok(judgment)
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn flags(&self) -> &[JudgmentFlag] {
        &self.flags
    }
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    verdict: String,
    #[serde(default)]
    failure_type: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    is_complete: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameRef;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pair() -> FramePair {
        FramePair {
            before: FrameRef::new("/tmp/before.png", "before"),
            after: FrameRef::new("/tmp/after.png", "after"),
        }
    }

    #[test]
    fn test_failed_result_has_no_change() {
        let result = ExecutionResult::failed(FailureCause::Transport, "adb died");
        assert!(!result.success());
        assert!(!result.visible_change());
        assert_eq!(result.cause(), Some(FailureCause::Transport));
        assert!(result.frames().is_none());
    }

    #[test]
    fn test_signaled_result() {
        let result = ExecutionResult::signaled(TerminalSignal::Done);
        assert!(result.success());
        assert!(!result.visible_change());
        assert_eq!(result.signal(), Some(TerminalSignal::Done));
        assert!(result.frames().is_none());
    }

    #[test]
    fn test_executed_result_keeps_frames() {
        let result = ExecutionResult::executed(pair(), true);
        assert!(result.visible_change());
        assert_eq!(result.frames().unwrap().after.label, "after");
        assert_eq!(result.reason(), "Action executed; UI changed");
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!(Verdict::parse(" PASS "), Some(Verdict::Pass));
        assert_eq!(Verdict::parse("incomplete"), Some(Verdict::Incomplete));
        assert_eq!(Verdict::parse("maybe"), None);
        assert!(Verdict::Fail.is_terminal());
        assert!(!Verdict::Incomplete.is_terminal());
    }

    #[test]
    fn test_judgment_drops_failure_kind_unless_fail() {
        let judgment = Judgment::new(Verdict::Pass, Some(FailureKind::AssertionFailure), "ok");
        assert_eq!(judgment.failure(), None);
        assert!(judgment.is_complete());
    }

    #[test]
    fn test_from_oracle_pass() {
        let judgment = Judgment::from_oracle(&json!({
            "verdict": "pass", "failure_type": null, "notes": "Vault open", "is_complete": true
        }))
        .unwrap();
        assert_eq!(judgment.verdict(), Verdict::Pass);
        assert!(judgment.is_complete());
        assert!(judgment.flags().is_empty());
    }

    #[test]
    fn test_from_oracle_coerces_completion() {
        let judgment = Judgment::from_oracle(&json!({
            "verdict": "incomplete", "notes": "still typing", "is_complete": true
        }))
        .unwrap();
        assert!(!judgment.is_complete());
        assert_eq!(judgment.flags(), &[JudgmentFlag::CompletionCoerced { reported: true }]);
    }

    #[test]
    fn test_from_oracle_defaults_failure_kind() {
        let judgment = Judgment::from_oracle(&json!({
            "verdict": "fail", "notes": "icon is gray", "is_complete": true
        }))
        .unwrap();
        assert_eq!(judgment.failure(), Some(FailureKind::AssertionFailure));
        assert_eq!(judgment.flags(), &[JudgmentFlag::MissingFailureType]);
    }

    #[test]
    fn test_from_oracle_rejects_unknown_verdict() {
        let err = Judgment::from_oracle(&json!({"verdict": "unsure"})).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_judgment_serializes_compactly() {
        let judgment = Judgment::execution_failure("No device connected");
        assert_eq!(
            serde_json::to_value(&judgment).unwrap(),
            json!({
                "verdict": "fail",
                "failure": "execution_failure",
                "notes": "No device connected",
                "complete": true
            })
        );
    }
}
