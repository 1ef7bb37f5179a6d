//! Types for test run results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::agent::{
    ExecutionResult, FailureKind, Judgment, JudgmentFlag, PlannedAction, RunOutcome, RunState, Verdict,
};

/// What happened during one step of a run
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Step number (1-based)
    pub step: u32,

    /// Action the planner chose (None if planning failed)
    pub action: Option<PlannedAction>,

    /// Execution result the supervisor judged
    pub result: Option<ExecutionResult>,

    /// Supervisor judgment for this step
    pub judgment: Judgment,

    /// Oracle calls consumed so far
    pub oracle_calls: u32,

    /// Consecutive steps without visible change
    pub no_change_count: u32,
}

impl StepRecord {
    pub fn new(state: &RunState, action: Option<PlannedAction>, judgment: &Judgment) -> Self {
        Self {
            step: state.step(),
            action,
            result: state.last_result().cloned(),
            judgment: judgment.clone(),
            oracle_calls: state.oracle_calls(),
            no_change_count: state.no_change_count(),
        }
    }
}

/// Result of a complete test-case run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Natural-language test case
    pub test_case: String,

    /// Expected verdict, when the case declares one
    pub expected: Option<Verdict>,

    /// How the run resolved
    pub outcome: RunOutcome,

    /// Final supervisor notes
    pub notes: Option<String>,

    /// Steps taken out of the step budget
    pub steps_taken: u32,
    pub step_budget: u32,

    /// Oracle calls made out of the oracle budget
    pub oracle_calls: u32,
    pub oracle_budget: u32,

    /// Judgments that departed from the oracle's literal reply
    pub flags: Vec<JudgmentFlag>,

    /// Per-step history
    pub steps: Vec<StepRecord>,

    /// Directory holding this run's frames
    pub frame_dir: Option<PathBuf>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn from_state(
        state: &RunState,
        expected: Option<Verdict>,
        steps: Vec<StepRecord>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            test_case: state.test_case().to_string(),
            expected,
            outcome: state.outcome(),
            notes: state.notes().map(str::to_string),
            steps_taken: state.step(),
            step_budget: state.step_budget(),
            oracle_calls: state.oracle_calls(),
            oracle_budget: state.oracle_budget(),
            flags: state.flags().to_vec(),
            steps,
            frame_dir: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn with_frame_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frame_dir = Some(dir.into());
        self
    }

    /// Final verdict, or None for an unresolved run
    pub fn verdict(&self) -> Option<Verdict> {
        match self.outcome {
            RunOutcome::Passed => Some(Verdict::Pass),
            RunOutcome::Failed(_) => Some(Verdict::Fail),
            RunOutcome::Unresolved => None,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self.outcome {
            RunOutcome::Failed(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether the outcome agrees with the expected verdict.
    /// None when the case declares no expectation.
    pub fn matches_expectation(&self) -> Option<bool> {
        self.expected.map(|expected| self.verdict() == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSettings;
    use pretty_assertions::assert_eq;

    fn finished(judgment: Judgment) -> RunState {
        let mut state = RunState::new("Open Obsidian", AgentSettings::defaults());
        state.begin_step();
        state.apply_judgment(&judgment);
        state
    }

    #[test]
    fn test_report_from_passed_state() {
        let state = finished(Judgment::new(Verdict::Pass, None, "vault open"));
        let report = RunReport::from_state(&state, Some(Verdict::Pass), Vec::new(), Utc::now());

        assert_eq!(report.verdict(), Some(Verdict::Pass));
        assert_eq!(report.failure(), None);
        assert_eq!(report.steps_taken, 1);
        assert_eq!(report.notes.as_deref(), Some("vault open"));
        assert_eq!(report.matches_expectation(), Some(true));
    }

    #[test]
    fn test_unresolved_never_matches() {
        let state = finished(Judgment::incomplete("still exploring"));
        let report = RunReport::from_state(&state, Some(Verdict::Fail), Vec::new(), Utc::now());

        assert_eq!(report.verdict(), None);
        assert_eq!(report.matches_expectation(), Some(false));
    }

    #[test]
    fn test_no_expectation() {
        let state = finished(Judgment::execution_failure("No device connected"));
        let report = RunReport::from_state(&state, None, Vec::new(), Utc::now());

        assert_eq!(report.failure(), Some(FailureKind::ExecutionFailure));
        assert_eq!(report.matches_expectation(), None);
    }

    #[test]
    fn test_report_serializes_outcome() {
        let state = finished(Judgment::new(Verdict::Fail, Some(FailureKind::AssertionFailure), "gray"));
        let report = RunReport::from_state(&state, None, Vec::new(), Utc::now());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["failure"], "assertion_failure");
    }
}
