//! Prompt assembly for planning and verification requests.

use crate::agent::RunState;

const PLANNER_PREAMBLE: &str = r#"You are PLANNER: a mobile QA planning agent for Android apps.
You MUST output ONLY valid JSON.

SCREEN INFO:
- Typical Android phone screen: ~1080x2400 pixels
- Safe tap zone: 100-980 (x), 200-2200 (y)
- Top bar / menu: y=100-300; bottom nav: y=2000-2300; center content: y=800-1600

Decide the NEXT SINGLE UI action that moves the test case forward.
- Only tap coordinates of an element you can clearly see in the screenshot.
- When unsure, navigate first (menu, scroll, back).
- Focus a text field before typing.
- If the requested element does not exist after exploring, answer "cannot_find".
- Answer "done" only when every requirement is visually confirmed.

Output schema:
{
  "action": "tap" | "type_text" | "swipe" | "keyevent" | "launch_app" | "done" | "cannot_find",
  "x": int|null,
  "y": int|null,
  "text": str|null,
  "keycode": int|null,
  "swipe": {"x1":int,"y1":int,"x2":int,"y2":int,"ms":int}|null,
  "why": "short reason for this specific action"
}"#;

const SUPERVISOR_PREAMBLE: &str = r#"You are SUPERVISOR: a mobile QA verification agent.
You MUST output ONLY valid JSON.

Decide whether the test case is COMPLETE and, if so, whether it passed.
Failure types:
- execution_failure: the tooling failed or a required element could not be found
- assertion_failure: the steps ran but the expected condition is false

Output schema:
{
  "verdict": "pass" | "fail" | "incomplete",
  "failure_type": "execution_failure" | "assertion_failure" | null,
  "notes": "concise explanation",
  "is_complete": true | false
}
Use is_complete=false exactly when verdict is "incomplete"."#;

/// Shared context block: test case, step counters, last action and result.
fn context_block(state: &RunState) -> String {
    let action = state
        .last_action()
        .map(|a| serde_json::to_string(a).unwrap_or_default())
        .unwrap_or_else(|| "none".to_string());
    let result = state
        .last_result()
        .map(|r| serde_json::to_string(r).unwrap_or_default())
        .unwrap_or_else(|| "none".to_string());

    format!(
        "TEST CASE:\n{}\n\nCURRENT STEP: {} / {}\n\nPREVIOUS ACTION:\n{}\n\nLAST EXECUTION RESULT:\n{}",
        state.test_case(),
        state.step(),
        state.step_budget(),
        action,
        result
    )
}

/// Prompt asking for the next action
pub fn planner_prompt(state: &RunState) -> String {
    format!(
        "{}\n\n{}\n\nAnalyze the screenshot and decide the NEXT action.\nReturn JSON only.",
        PLANNER_PREAMBLE,
        context_block(state)
    )
}

/// Prompt verifying a test case the planner declared done
pub fn verify_done_prompt(state: &RunState) -> String {
    format!(
        "{}\n\n{}\n\nThe planner has signaled \"done\". Verify against the screenshot whether the whole test case is satisfied and answer \"pass\" or \"fail\".\nReturn JSON only.",
        SUPERVISOR_PREAMBLE,
        context_block(state)
    )
}

/// Prompt judging progress after an ordinary action
pub fn progress_prompt(state: &RunState) -> String {
    format!(
        "{}\n\n{}\n\nIf every requirement is met, answer \"pass\" or \"fail\". Otherwise answer \"incomplete\" with is_complete=false.\nReturn JSON only.",
        SUPERVISOR_PREAMBLE,
        context_block(state)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Action, PlannedAction};
    use crate::config::AgentSettings;

    #[test]
    fn test_planner_prompt_carries_context() {
        let mut state = RunState::new("Open Obsidian", AgentSettings::defaults());
        state.begin_step();
        let prompt = planner_prompt(&state);
        assert!(prompt.contains("TEST CASE:\nOpen Obsidian"));
        assert!(prompt.contains("CURRENT STEP: 1 / 12"));
        assert!(prompt.contains("PREVIOUS ACTION:\nnone"));
    }

    #[test]
    fn test_verify_prompt_mentions_done_and_last_action() {
        let mut state = RunState::new("Create a vault", AgentSettings::defaults());
        state.begin_step();
        state.set_last_action(PlannedAction::new(Action::Done, "vault visible"));
        let prompt = verify_done_prompt(&state);
        assert!(prompt.contains("signaled \"done\""));
        assert!(prompt.contains("\"action\":\"done\""));
    }

    #[test]
    fn test_progress_prompt_allows_incomplete() {
        let state = RunState::new("x", AgentSettings::defaults());
        assert!(progress_prompt(&state).contains("\"incomplete\""));
    }
}
