//! Action Planner: turns the current screen and run context into one action.

use tracing::{debug, info, instrument};

use super::action::{Action, PlannedAction};
use super::error::StepError;
use super::fallback::FallbackPolicy;
use super::state::RunState;
use crate::frame::VisualDiff;
use crate::oracle::{DecisionOracle, planner_prompt};

#[derive(Debug, Clone, Default)]
pub struct Planner {
    fallbacks: FallbackPolicy,
}

impl Planner {
    pub fn new(fallbacks: FallbackPolicy) -> Self {
        Self { fallbacks }
    }

    pub fn fallbacks(&self) -> &FallbackPolicy {
        &self.fallbacks
    }

    /// Decide the next action and record it as the run's last action.
    ///
    /// In order: a spent oracle budget yields `cannot_find`; a previous step
    /// without visible change yields a fallback move without consulting the
    /// oracle; otherwise the oracle is asked, with the current frame attached.
    #[instrument(skip_all, fields(step = state.step()))]
    pub fn plan<V, O>(
        &self,
        state: &mut RunState,
        frames: &mut V,
        oracle: &mut O,
    ) -> Result<PlannedAction, StepError>
    where
        V: VisualDiff,
        O: DecisionOracle,
    {
        if state.oracle_budget_exhausted() {
            info!(calls = state.oracle_calls(), "oracle budget exhausted");
            let planned = PlannedAction::new(
                Action::CannotFind,
                format!("Exceeded decision oracle call budget ({})", state.oracle_budget()),
            );
            state.set_last_action(planned.clone());
            return Ok(planned);
        }

        let stagnant = state
            .last_result()
            .is_some_and(|result| result.success() && !result.visible_change());
        if stagnant {
            let planned = self.fallbacks.for_step(state.step()).clone();
            info!(action = planned.action.name(), "previous step changed nothing; using fallback");
            state.set_last_action(planned.clone());
            return Ok(planned);
        }

        let frame = match state.last_frame() {
            Some(frame) => frame.clone(),
            None => {
                let frame = frames.capture(&format!("step_{}", state.step()))?;
                state.set_last_frame(frame.clone());
                frame
            }
        };
        let image = frames.frame_bytes(&frame)?;

        let prompt = planner_prompt(state);
        state.reserve_oracle_call();
        let decision = oracle.decide(&prompt, Some(&image))?;
        debug!(%decision, remaining = state.oracle_budget_remaining(), "planner decision");

        let planned = PlannedAction::from_decision(decision)?;
        info!(action = planned.action.name(), why = %planned.why, "planned");
        state.set_last_action(planned.clone());
        Ok(planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::outcome::{ExecutionResult, FailureCause, TerminalSignal};
    use crate::config::AgentSettings;
    use crate::oracle::OracleError;
    use crate::test_support::{ScriptedFrames, ScriptedOracle};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state_with_budget(oracle_budget: u32) -> RunState {
        let mut state = RunState::new(
            "Open Obsidian",
            AgentSettings {
                oracle_budget,
                ..AgentSettings::defaults()
            },
        );
        state.begin_step();
        state
    }

    #[test]
    fn test_first_step_consults_oracle_with_frame() {
        let mut state = state_with_budget(10);
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new().reply(json!({"action": "launch_app", "why": "start"}));

        let planned = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap();

        assert_eq!(planned.action, Action::LaunchApp);
        assert_eq!(state.oracle_calls(), 1);
        assert_eq!(frames.captures(), vec!["step_1".to_string()]);
        assert!(oracle.prompts()[0].contains("Open Obsidian"));
        assert!(oracle.saw_image(0));
        assert_eq!(state.last_action(), Some(&planned));
    }

    #[test]
    fn test_reuses_last_frame() {
        let mut state = state_with_budget(10);
        state.set_last_frame(crate::frame::FrameRef::new("/virtual/after.png", "after"));
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new().reply(json!({"action": "done", "why": "ok"}));

        Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap();
        assert!(frames.captures().is_empty());
    }

    #[test]
    fn test_budget_exhausted_yields_cannot_find() {
        let mut state = state_with_budget(0);
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new();

        let planned = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap();

        assert_eq!(planned.action, Action::CannotFind);
        assert_eq!(planned.why, "Exceeded decision oracle call budget (0)");
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_stagnation_uses_fallback_without_oracle() {
        let mut state = state_with_budget(10);
        state.begin_step();
        state.begin_step();
        state.begin_step(); // step 4
        state.record_execution(ExecutionResult::signaled(TerminalSignal::Done));
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new();

        let planned = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap();

        assert!(matches!(planned.action, Action::Swipe(_)));
        assert_eq!(oracle.calls(), 0);
        assert_eq!(state.oracle_calls(), 0);
    }

    #[test]
    fn test_failed_previous_result_is_not_stagnation() {
        let mut state = state_with_budget(10);
        state.record_execution(ExecutionResult::failed(FailureCause::Transport, "x"));
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new().reply(json!({"action": "tap", "x": 1, "y": 2}));

        let planned = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap();
        assert_eq!(planned.action, Action::Tap { x: 1, y: 2 });
    }

    #[test]
    fn test_oracle_failure_is_counted_and_propagated() {
        let mut state = state_with_budget(10);
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new().fail(OracleError::ConnectionFailed("offline".into()));

        let err = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap_err();

        assert_eq!(err.cause(), FailureCause::OracleUnavailable);
        assert_eq!(state.oracle_calls(), 1);
        assert!(state.last_action().is_none());
    }

    #[test]
    fn test_unknown_action_propagates_contract_violation() {
        let mut state = state_with_budget(10);
        let mut frames = ScriptedFrames::new();
        let mut oracle = ScriptedOracle::new().reply(json!({"action": "pinch", "why": "zoom"}));

        let err = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap_err();
        assert_eq!(err.cause(), FailureCause::ContractViolation);
    }

    #[test]
    fn test_capture_failure_skips_oracle() {
        let mut state = state_with_budget(10);
        let mut frames = ScriptedFrames::new().fail_captures();
        let mut oracle = ScriptedOracle::new();

        let err = Planner::default().plan(&mut state, &mut frames, &mut oracle).unwrap_err();
        assert_eq!(err.cause(), FailureCause::FrameCapture);
        assert_eq!(oracle.calls(), 0);
        assert_eq!(state.oracle_calls(), 0);
    }
}
