//! Planned UI actions and their oracle wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StepError;
use crate::config::DEFAULT_SWIPE_MS;
use crate::oracle::OracleError;

/// A swipe between two screen points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeGesture {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// Duration in milliseconds
    #[serde(default = "default_swipe_ms")]
    pub ms: u32,
}

fn default_swipe_ms() -> u32 {
    DEFAULT_SWIPE_MS
}

/// One UI step. `Done` and `CannotFind` are terminal signals, not device commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Tap { x: i32, y: i32 },
    TypeText { text: String },
    KeyEvent { code: u32 },
    Swipe(SwipeGesture),
    LaunchApp,
    Done,
    CannotFind,
}

impl Action {
    /// Wire name used in oracle payloads
    pub fn name(&self) -> &'static str {
        match self {
            Action::Tap { .. } => "tap",
            Action::TypeText { .. } => "type_text",
            Action::KeyEvent { .. } => "keyevent",
            Action::Swipe(_) => "swipe",
            Action::LaunchApp => "launch_app",
            Action::Done => "done",
            Action::CannotFind => "cannot_find",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Done | Action::CannotFind)
    }
}

/// An action plus the planner's short justification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RawDecision", try_from = "RawDecision")]
pub struct PlannedAction {
    pub action: Action,
    pub why: String,
}

impl PlannedAction {
    pub fn new(action: Action, why: impl Into<String>) -> Self {
        Self {
            action,
            why: why.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.action.is_terminal()
    }

    /// Interpret an oracle decision object.
    ///
    /// A payload that does not have the decision shape is an oracle parse
    /// failure; a well-formed payload naming an unknown action, or missing the
    /// fields its action needs, is a planner contract violation.
    pub fn from_decision(value: Value) -> Result<Self, StepError> {
        let raw: RawDecision = serde_json::from_value(value)
            .map_err(|e| StepError::Oracle(OracleError::Parse(format!("decision shape: {}", e))))?;
        PlannedAction::try_from(raw).map_err(StepError::Contract)
    }
}

/// Flat decision object exchanged with the oracle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawDecision {
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keycode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    swipe: Option<SwipeGesture>,
    #[serde(default)]
    why: String,
}

impl From<PlannedAction> for RawDecision {
    fn from(planned: PlannedAction) -> Self {
        let mut raw = RawDecision {
            action: planned.action.name().to_string(),
            why: planned.why,
            ..Default::default()
        };
        match planned.action {
            Action::Tap { x, y } => {
                raw.x = Some(x);
                raw.y = Some(y);
            }
            Action::TypeText { text } => raw.text = Some(text),
            Action::KeyEvent { code } => raw.keycode = Some(code),
            Action::Swipe(gesture) => raw.swipe = Some(gesture),
            Action::LaunchApp | Action::Done | Action::CannotFind => {}
        }
        raw
    }
}

impl TryFrom<RawDecision> for PlannedAction {
    type Error = String;

    fn try_from(raw: RawDecision) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("action '{}' requires '{}'", raw.action, field);

        let action = match raw.action.trim() {
            "tap" => Action::Tap {
                x: raw.x.ok_or_else(|| missing("x"))?,
                y: raw.y.ok_or_else(|| missing("y"))?,
            },
            "type_text" => Action::TypeText {
                text: raw.text.clone().unwrap_or_default(),
            },
            "keyevent" => Action::KeyEvent {
                code: raw.keycode.ok_or_else(|| missing("keycode"))?,
            },
            "swipe" => Action::Swipe(raw.swipe.ok_or_else(|| missing("swipe"))?),
            "launch_app" => Action::LaunchApp,
            "done" => Action::Done,
            "cannot_find" => Action::CannotFind,
            other => return Err(format!("unknown action '{}'", other)),
        };

        Ok(PlannedAction {
            action,
            why: raw.why,
        })
    }
}
