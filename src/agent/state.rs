//! Mutable record of a single test-case run.
//!
//! Counters only move forward: `step` never exceeds the step budget and
//! `oracle_calls` never exceeds the oracle budget. Once a terminal verdict is
//! applied the run is complete and further judgments are ignored.

use serde::{Deserialize, Serialize};

use super::action::PlannedAction;
use super::outcome::{ExecutionResult, FailureKind, Judgment, JudgmentFlag, Verdict};
use crate::config::AgentSettings;
use crate::frame::FrameRef;

/// How a finished run resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "failure")]
pub enum RunOutcome {
    Passed,
    Failed(FailureKind),
    /// Step budget ran out before any terminal verdict
    Unresolved,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Passed => write!(f, "pass"),
            RunOutcome::Failed(kind) => write!(f, "fail ({})", kind),
            RunOutcome::Unresolved => write!(f, "unresolved"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunState {
    test_case: String,
    step: u32,
    step_budget: u32,
    oracle_calls: u32,
    oracle_budget: u32,
    no_change_count: u32,
    last_action: Option<PlannedAction>,
    last_result: Option<ExecutionResult>,
    last_frame: Option<FrameRef>,
    verdict: Option<Verdict>,
    failure: Option<FailureKind>,
    notes: Option<String>,
    complete: bool,
    flags: Vec<JudgmentFlag>,
}

impl RunState {
    pub fn new(test_case: impl Into<String>, settings: AgentSettings) -> Self {
        Self {
            test_case: test_case.into(),
            step: 0,
            step_budget: settings.step_budget,
            oracle_calls: 0,
            oracle_budget: settings.oracle_budget,
            no_change_count: 0,
            last_action: None,
            last_result: None,
            last_frame: None,
            verdict: None,
            failure: None,
            notes: None,
            complete: false,
            flags: Vec::new(),
        }
    }

    /// Advance to the next step. Returns false once the run is complete or
    /// the step budget is spent.
    pub fn begin_step(&mut self) -> bool {
        if self.complete || self.step >= self.step_budget {
            return false;
        }
        self.step += 1;
        true
    }

    pub fn oracle_budget_exhausted(&self) -> bool {
        self.oracle_calls >= self.oracle_budget
    }

    pub fn oracle_budget_remaining(&self) -> u32 {
        self.oracle_budget.saturating_sub(self.oracle_calls)
    }

    /// Count an oracle call before it is made. Returns false, without
    /// counting, when the budget is already spent.
    pub fn reserve_oracle_call(&mut self) -> bool {
        if self.oracle_budget_exhausted() {
            return false;
        }
        self.oracle_calls += 1;
        true
    }

    pub fn set_last_action(&mut self, action: PlannedAction) {
        self.last_action = Some(action);
    }

    /// Store the step's execution result; its after-frame becomes the
    /// frame the next planning step looks at.
    pub fn record_execution(&mut self, result: ExecutionResult) {
        if let Some(frames) = result.frames() {
            self.last_frame = Some(frames.after.clone());
        }
        self.last_result = Some(result);
    }

    pub fn set_last_frame(&mut self, frame: FrameRef) {
        self.last_frame = Some(frame);
    }

    /// Count a step without visible change and return the new streak
    pub fn record_stagnant_step(&mut self) -> u32 {
        self.no_change_count += 1;
        self.no_change_count
    }

    pub fn reset_stagnation(&mut self) {
        self.no_change_count = 0;
    }

    /// Fold a judgment into the run. A complete run keeps its verdict.
    pub fn apply_judgment(&mut self, judgment: &Judgment) {
        if self.complete {
            return;
        }
        self.verdict = Some(judgment.verdict());
        self.failure = judgment.failure();
        self.notes = Some(judgment.notes().to_string());
        self.complete = judgment.is_complete();
        self.flags.extend_from_slice(judgment.flags());
    }

    pub fn outcome(&self) -> RunOutcome {
        match (self.complete, self.verdict) {
            (true, Some(Verdict::Pass)) => RunOutcome::Passed,
            (true, Some(Verdict::Fail)) => {
                RunOutcome::Failed(self.failure.unwrap_or(FailureKind::ExecutionFailure))
            }
            _ => RunOutcome::Unresolved,
        }
    }

    pub fn test_case(&self) -> &str {
        &self.test_case
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn step_budget(&self) -> u32 {
        self.step_budget
    }

    pub fn oracle_calls(&self) -> u32 {
        self.oracle_calls
    }

    pub fn oracle_budget(&self) -> u32 {
        self.oracle_budget
    }

    pub fn no_change_count(&self) -> u32 {
        self.no_change_count
    }

    pub fn last_action(&self) -> Option<&PlannedAction> {
        self.last_action.as_ref()
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.last_result.as_ref()
    }

    pub fn last_frame(&self) -> Option<&FrameRef> {
        self.last_frame.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn flags(&self) -> &[JudgmentFlag] {
        &self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::outcome::FailureCause;
    use pretty_assertions::assert_eq;

    fn settings(step_budget: u32, oracle_budget: u32) -> AgentSettings {
        AgentSettings {
            step_budget,
            oracle_budget,
            ..AgentSettings::defaults()
        }
    }

    #[test]
    fn test_step_budget_is_respected() {
        let mut state = RunState::new("t", settings(2, 10));
        assert!(state.begin_step());
        assert!(state.begin_step());
        assert!(!state.begin_step());
        assert_eq!(state.step(), 2);
    }

    #[test]
    fn test_oracle_budget_never_exceeded() {
        let mut state = RunState::new("t", settings(12, 2));
        assert!(state.reserve_oracle_call());
        assert!(state.reserve_oracle_call());
        assert!(!state.reserve_oracle_call());
        assert_eq!(state.oracle_calls(), 2);
        assert_eq!(state.oracle_budget_remaining(), 0);
    }

    #[test]
    fn test_terminal_judgment_is_sticky() {
        let mut state = RunState::new("t", AgentSettings::defaults());
        state.begin_step();
        state.apply_judgment(&Judgment::new(Verdict::Pass, None, "done"));
        state.apply_judgment(&Judgment::execution_failure("late"));
        assert_eq!(state.outcome(), RunOutcome::Passed);
        assert_eq!(state.notes(), Some("done"));
        assert!(!state.begin_step());
    }

    #[test]
    fn test_incomplete_is_unresolved() {
        let mut state = RunState::new("t", AgentSettings::defaults());
        state.apply_judgment(&Judgment::incomplete("keep going"));
        assert!(!state.is_complete());
        assert_eq!(state.outcome(), RunOutcome::Unresolved);
    }

    #[test]
    fn test_failed_outcome_carries_kind() {
        let mut state = RunState::new("t", AgentSettings::defaults());
        state.apply_judgment(&Judgment::new(
            Verdict::Fail,
            Some(FailureKind::AssertionFailure),
            "wrong color",
        ));
        assert_eq!(state.outcome(), RunOutcome::Failed(FailureKind::AssertionFailure));
    }

    #[test]
    fn test_failed_execution_keeps_previous_frame() {
        let mut state = RunState::new("t", AgentSettings::defaults());
        state.set_last_frame(FrameRef::new("/tmp/a.png", "step_1"));
        state.record_execution(ExecutionResult::failed(FailureCause::Transport, "x"));
        assert_eq!(state.last_frame().unwrap().label, "step_1");
    }

    #[test]
    fn test_stagnation_streak() {
        let mut state = RunState::new("t", AgentSettings::defaults());
        assert_eq!(state.record_stagnant_step(), 1);
        assert_eq!(state.record_stagnant_step(), 2);
        state.reset_stagnation();
        assert_eq!(state.no_change_count(), 0);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RunOutcome::Failed(FailureKind::ExecutionFailure).to_string(), "fail (execution_failure)");
        assert_eq!(RunOutcome::Unresolved.to_string(), "unresolved");
    }
}
