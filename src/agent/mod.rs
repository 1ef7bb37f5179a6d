//! The control loop: plan one action, execute it, judge the outcome.

pub mod action;
pub mod controller;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod outcome;
pub mod planner;
pub mod state;
pub mod supervisor;

pub use action::{Action, PlannedAction, SwipeGesture};
pub use controller::RunController;
pub use error::StepError;
pub use executor::Executor;
pub use fallback::{FallbackPolicy, KEYCODE_BACK};
pub use outcome::{
    ExecutionResult, FailureCause, FailureKind, Judgment, JudgmentFlag, TerminalSignal, Verdict,
};
pub use planner::Planner;
pub use state::{RunOutcome, RunState};
pub use supervisor::Supervisor;
