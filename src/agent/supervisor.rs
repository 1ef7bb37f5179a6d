//! Outcome Supervisor: judges each step and decides when the run is over.

use tracing::{info, instrument, warn};

use super::action::Action;
use super::outcome::{Judgment, JudgmentFlag};
use super::state::RunState;
use crate::config::STAGNATION_CEILING;
use crate::frame::VisualDiff;
use crate::oracle::{DecisionOracle, progress_prompt, verify_done_prompt};

#[derive(Debug, Clone)]
pub struct Supervisor {
    stagnation_ceiling: u32,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(STAGNATION_CEILING)
    }
}

impl Supervisor {
    pub fn new(stagnation_ceiling: u32) -> Self {
        Self {
            stagnation_ceiling: stagnation_ceiling.max(1),
        }
    }

    pub fn stagnation_ceiling(&self) -> u32 {
        self.stagnation_ceiling
    }

    /// Judge the latest execution result.
    ///
    /// Rules apply in order and the first match wins:
    /// 1. An unsuccessful result fails the run as an execution failure.
    /// 2. `cannot_find` fails the run as an execution failure.
    /// 3. No visible change extends the stagnation streak; reaching the
    ///    ceiling fails the run, otherwise the step is incomplete. The oracle
    ///    is not consulted, even for `done`.
    /// 4. Otherwise the oracle judges progress, or verifies `done`.
    #[instrument(skip_all, fields(step = state.step()))]
    pub fn supervise<V, O>(&self, state: &mut RunState, frames: &V, oracle: &mut O) -> Judgment
    where
        V: VisualDiff,
        O: DecisionOracle,
    {
        let Some(result) = state.last_result().cloned() else {
            return Judgment::execution_failure("No execution result recorded");
        };

        if !result.success() {
            return Judgment::execution_failure(result.reason());
        }

        let action = state.last_action().map(|planned| planned.action.clone());
        if action == Some(Action::CannotFind) {
            let why = state.last_action().map(|p| p.why.as_str()).unwrap_or_default();
            return Judgment::execution_failure(format!("Required UI element not found: {}", why));
        }

        if !result.visible_change() {
            let streak = state.record_stagnant_step();
            if streak >= self.stagnation_ceiling {
                warn!(streak, "UI stagnated");
                return Judgment::execution_failure(format!(
                    "UI did not change after {} consecutive attempts",
                    streak
                ));
            }
            return Judgment::incomplete("No UI change detected; continuing exploration");
        }

        state.reset_stagnation();
        self.consult(state, frames, oracle, action == Some(Action::Done))
    }

    fn consult<V, O>(&self, state: &mut RunState, frames: &V, oracle: &mut O, is_done: bool) -> Judgment
    where
        V: VisualDiff,
        O: DecisionOracle,
    {
        if state.oracle_budget_exhausted() {
            info!("no oracle budget left to judge this step");
            return Judgment::incomplete("Decision oracle budget exhausted; verdict deferred")
                .with_flag(JudgmentFlag::OracleBudgetExhausted);
        }

        let image = match state.last_frame() {
            Some(frame) => match frames.frame_bytes(frame) {
                Ok(bytes) => Some(bytes),
                Err(e) => return Judgment::execution_failure(format!("Could not read frame: {}", e)),
            },
            None => None,
        };

        let prompt = if is_done {
            verify_done_prompt(state)
        } else {
            progress_prompt(state)
        };
        state.reserve_oracle_call();

        let reply = match oracle.decide(&prompt, image.as_deref()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "supervisor oracle call failed");
                return Judgment::execution_failure(format!("Decision oracle failed: {}", e));
            }
        };

        let judgment = match Judgment::from_oracle(&reply) {
            Ok(judgment) => judgment,
            Err(e) => return Judgment::execution_failure(format!("Decision oracle failed: {}", e)),
        };

        if !is_done && judgment.is_complete() {
            warn!(verdict = %judgment.verdict(), "run resolved without a done signal");
            return judgment.with_flag(JudgmentFlag::ResolvedWithoutDone);
        }
        info!(verdict = %judgment.verdict(), "judged");
        judgment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::action::PlannedAction;
    use crate::agent::outcome::{ExecutionResult, FailureCause, FailureKind, TerminalSignal, Verdict};
    use crate::config::AgentSettings;
    use crate::frame::{FramePair, FrameRef};
    use crate::oracle::OracleError;
    use crate::test_support::{ScriptedFrames, ScriptedOracle};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state_after(action: Action, result: ExecutionResult) -> RunState {
        let mut state = RunState::new("Open Obsidian", AgentSettings::defaults());
        state.begin_step();
        state.set_last_action(PlannedAction::new(action, "because"));
        state.record_execution(result);
        state
    }

    fn changed() -> ExecutionResult {
        ExecutionResult::executed(
            FramePair {
                before: FrameRef::new("/virtual/before.png", "before"),
                after: FrameRef::new("/virtual/after.png", "after"),
            },
            true,
        )
    }

    fn unchanged() -> ExecutionResult {
        ExecutionResult::executed(
            FramePair {
                before: FrameRef::new("/virtual/before.png", "before"),
                after: FrameRef::new("/virtual/after.png", "after"),
            },
            false,
        )
    }

    #[test]
    fn test_failed_execution_is_execution_failure() {
        let mut state = state_after(
            Action::Tap { x: 1, y: 1 },
            ExecutionResult::failed(FailureCause::Connectivity, "No device connected"),
        );
        let mut oracle = ScriptedOracle::new();

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.verdict(), Verdict::Fail);
        assert_eq!(judgment.failure(), Some(FailureKind::ExecutionFailure));
        assert_eq!(judgment.notes(), "No device connected");
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_cannot_find_is_execution_failure() {
        let mut state = state_after(Action::CannotFind, ExecutionResult::signaled(TerminalSignal::CannotFind));
        let mut oracle = ScriptedOracle::new();

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.failure(), Some(FailureKind::ExecutionFailure));
        assert_eq!(judgment.notes(), "Required UI element not found: because");
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_no_change_below_ceiling_is_incomplete() {
        let mut state = state_after(Action::KeyEvent { code: 4 }, unchanged());
        let mut oracle = ScriptedOracle::new();

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.verdict(), Verdict::Incomplete);
        assert!(!judgment.is_complete());
        assert_eq!(state.no_change_count(), 1);
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_stagnation_ceiling_fails() {
        let mut state = state_after(Action::KeyEvent { code: 4 }, unchanged());
        let supervisor = Supervisor::new(3);
        let frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new();

        supervisor.supervise(&mut state, &frames, &mut oracle);
        supervisor.supervise(&mut state, &frames, &mut oracle);
        let judgment = supervisor.supervise(&mut state, &frames, &mut oracle);

        assert_eq!(judgment.failure(), Some(FailureKind::ExecutionFailure));
        assert_eq!(judgment.notes(), "UI did not change after 3 consecutive attempts");
    }

    #[test]
    fn test_change_resets_streak_and_consults_oracle() {
        let mut state = state_after(Action::Tap { x: 1, y: 1 }, changed());
        state.record_stagnant_step();
        let mut oracle = ScriptedOracle::new().reply(json!({
            "verdict": "incomplete", "failure_type": null, "notes": "vault list shown", "is_complete": false
        }));

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.verdict(), Verdict::Incomplete);
        assert_eq!(state.no_change_count(), 0);
        assert_eq!(state.oracle_calls(), 1);
        assert!(oracle.prompts()[0].contains("is_complete=false"));
        assert!(oracle.saw_image(0));
    }

    #[test]
    fn test_signaled_done_without_change_is_incomplete() {
        let mut state = state_after(Action::Done, ExecutionResult::signaled(TerminalSignal::Done));
        let mut oracle = ScriptedOracle::new().reply(json!({
            "verdict": "pass", "failure_type": null, "notes": "InternVault open", "is_complete": true
        }));

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.verdict(), Verdict::Incomplete);
        assert!(!judgment.is_complete());
        assert_eq!(state.no_change_count(), 1);
        assert_eq!(state.oracle_calls(), 0);
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_done_with_change_is_verified_once() {
        for (verdict, failure_type) in [("pass", None), ("fail", Some("assertion_failure"))] {
            let mut state = state_after(Action::Done, changed());
            state.set_last_frame(FrameRef::new("/virtual/after.png", "after"));
            let mut oracle = ScriptedOracle::new().reply(json!({
                "verdict": verdict, "failure_type": failure_type, "notes": "checked", "is_complete": true
            }));

            let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

            assert_eq!(judgment.verdict().as_str(), verdict);
            assert!(judgment.is_complete());
            assert!(judgment.flags().is_empty());
            assert_eq!(state.oracle_calls(), 1);
            assert_eq!(oracle.calls(), 1);
            assert!(oracle.prompts()[0].contains("signaled \"done\""));
        }
    }

    #[test]
    fn test_done_with_change_handles_incomplete_reply() {
        let mut state = state_after(Action::Done, changed());
        let mut oracle = ScriptedOracle::new().reply(json!({
            "verdict": "incomplete", "failure_type": null, "notes": "dialog still open", "is_complete": true
        }));

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.verdict(), Verdict::Incomplete);
        assert!(!judgment.is_complete());
        assert_eq!(state.oracle_calls(), 1);
    }

    #[test]
    fn test_resolution_without_done_is_flagged() {
        let mut state = state_after(Action::Tap { x: 1, y: 1 }, changed());
        let mut oracle = ScriptedOracle::new().reply(json!({
            "verdict": "fail", "failure_type": "assertion_failure", "notes": "icon not red", "is_complete": true
        }));

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.failure(), Some(FailureKind::AssertionFailure));
        assert_eq!(judgment.flags(), &[JudgmentFlag::ResolvedWithoutDone]);
    }

    #[test]
    fn test_exhausted_budget_defers() {
        let mut state = RunState::new(
            "t",
            AgentSettings {
                oracle_budget: 0,
                ..AgentSettings::defaults()
            },
        );
        state.begin_step();
        state.set_last_action(PlannedAction::new(Action::Tap { x: 1, y: 1 }, "t"));
        state.record_execution(changed());
        let mut oracle = ScriptedOracle::new();

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert_eq!(judgment.verdict(), Verdict::Incomplete);
        assert_eq!(judgment.flags(), &[JudgmentFlag::OracleBudgetExhausted]);
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_oracle_failure_is_terminal() {
        let mut state = state_after(Action::Tap { x: 1, y: 1 }, changed());
        let mut oracle = ScriptedOracle::new().fail(OracleError::Parse("garbage".into()));

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);

        assert!(judgment.is_complete());
        assert_eq!(judgment.failure(), Some(FailureKind::ExecutionFailure));
        assert_eq!(state.oracle_calls(), 1);
    }

    #[test]
    fn test_unknown_verdict_is_execution_failure() {
        let mut state = state_after(Action::Tap { x: 1, y: 1 }, changed());
        let mut oracle = ScriptedOracle::new().reply(json!({"verdict": "probably"}));

        let judgment = Supervisor::default().supervise(&mut state, &ScriptedFrames::new(), &mut oracle);
        assert_eq!(judgment.failure(), Some(FailureKind::ExecutionFailure));
    }
}
