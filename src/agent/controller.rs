//! Run Controller: sequences plan, execute and supervise for one test case.

use tracing::{info, info_span, warn};

use super::executor::Executor;
use super::outcome::ExecutionResult;
use super::planner::Planner;
use super::state::RunState;
use super::supervisor::Supervisor;
use crate::config::AgentSettings;
use crate::device::DeviceControl;
use crate::frame::VisualDiff;
use crate::oracle::DecisionOracle;
use crate::runner::StepRecord;

/// Owns the collaborators for a run and drives the per-step loop
#[derive(Debug)]
pub struct RunController<D, V, O> {
    device: D,
    frames: V,
    oracle: O,
    planner: Planner,
    executor: Executor,
    supervisor: Supervisor,
    settings: AgentSettings,
}

impl<D, V, O> RunController<D, V, O>
where
    D: DeviceControl,
    V: VisualDiff,
    O: DecisionOracle,
{
    pub fn new(device: D, frames: V, oracle: O, settings: AgentSettings, package_id: impl Into<String>) -> Self {
        Self {
            device,
            frames,
            oracle,
            planner: Planner::default(),
            executor: Executor::from_settings(&settings, package_id),
            supervisor: Supervisor::new(settings.stagnation_ceiling),
            settings,
        }
    }

    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_supervisor(mut self, supervisor: Supervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn frames(&self) -> &V {
        &self.frames
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Run `test_case` for at most `step_budget` steps
    pub fn run(&mut self, test_case: &str, step_budget: u32) -> RunState {
        self.run_with_observer(test_case, step_budget, |_| {})
    }

    /// Run `test_case`, handing each finished step to `on_step`.
    ///
    /// Stops at the first terminal verdict or when the step budget is spent;
    /// an unresolved run returns with no verdict of pass or fail.
    pub fn run_with_observer<F>(&mut self, test_case: &str, step_budget: u32, mut on_step: F) -> RunState
    where
        F: FnMut(&StepRecord),
    {
        let settings = AgentSettings {
            step_budget,
            ..self.settings
        };
        let mut state = RunState::new(test_case, settings);
        let span = info_span!("run", test_case = %test_case);
        let _guard = span.enter();
        info!(step_budget, oracle_budget = settings.oracle_budget, "starting run");

        while state.begin_step() {
            let planned = match self.planner.plan(&mut state, &mut self.frames, &mut self.oracle) {
                Ok(planned) => Some(planned),
                Err(e) => {
                    warn!(step = state.step(), error = %e, "planning failed");
                    state.record_execution(ExecutionResult::failed(e.cause(), format!("Planning failed: {}", e)));
                    None
                }
            };
            if let Some(planned) = &planned {
                let result = self.executor.execute(planned, &self.device, &mut self.frames);
                state.record_execution(result);
            }

            let judgment = self.supervisor.supervise(&mut state, &self.frames, &mut self.oracle);
            state.apply_judgment(&judgment);
            on_step(&StepRecord::new(&state, planned, &judgment));

            if state.is_complete() {
                break;
            }
        }

        if state.is_complete() {
            info!(outcome = %state.outcome(), steps = state.step(), oracle_calls = state.oracle_calls(), "run finished");
        } else {
            warn!(steps = state.step(), "step budget exhausted without a verdict");
        }
        state
    }
}
