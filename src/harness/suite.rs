//! Running a list of test cases, one fresh run per case.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::agent::{RunController, Verdict};
use crate::config;
use crate::device::{AdbConfig, AdbDevice, DeviceControl};
use crate::frame::{AdbScreenshots, VisualDiff};
use crate::harness::types::{HarnessError, HarnessResult, SuiteConfig, TestCase};
use crate::oracle::{DecisionOracle, HttpOracle, OracleConfig};
use crate::runner::{RunReport, StepRecord};
use crate::session::Session;

/// Progress notifications emitted while a suite runs
#[derive(Debug)]
pub enum SuiteEvent<'a> {
    CaseStarted { index: usize, case: &'a TestCase },
    Step(&'a StepRecord),
    CaseFinished { report: &'a RunReport, report_path: Option<&'a Path> },
}

/// The built-in Obsidian cases
pub fn default_cases() -> Vec<TestCase> {
    vec![
        TestCase::new(
            "Open Obsidian, create a new Vault named 'InternVault', and enter the vault.",
            Some(Verdict::Pass),
        ),
        TestCase::new(
            "Create a new note titled 'Meeting Notes' and type the text 'Daily Standup' into the body.",
            Some(Verdict::Pass),
        ),
        TestCase::new(
            "Go to Settings and verify that the 'Appearance' tab icon is the color Red.",
            Some(Verdict::Fail),
        ),
        TestCase::new(
            "Find and click the 'Print to PDF' button in the main file menu.",
            Some(Verdict::Fail),
        ),
    ]
}

/// Load cases from a JSON array of `{"description": .., "expected": ..}`
pub fn load_cases(path: &Path) -> HarnessResult<Vec<TestCase>> {
    let content = fs::read_to_string(path)?;
    let cases: Vec<TestCase> = serde_json::from_str(&content)?;

    if cases.is_empty() {
        return Err(HarnessError::Cases(format!("{} holds no test cases", path.display())));
    }
    if let Some(pos) = cases.iter().position(|c| c.description.trim().is_empty()) {
        return Err(HarnessError::Cases(format!("case {} has an empty description", pos + 1)));
    }
    if let Some(pos) = cases.iter().position(|c| c.expected == Some(Verdict::Incomplete)) {
        return Err(HarnessError::Cases(format!(
            "case {} expects 'incomplete'; only pass or fail can be expected",
            pos + 1
        )));
    }
    Ok(cases)
}

/// Drive one case through `controller` and build its report
pub fn run_case<D, V, O, F>(
    controller: &mut RunController<D, V, O>,
    case: &TestCase,
    step_budget: u32,
    mut on_step: F,
) -> RunReport
where
    D: DeviceControl,
    V: VisualDiff,
    O: DecisionOracle,
    F: FnMut(&StepRecord),
{
    let started_at = Utc::now();
    let mut steps = Vec::new();
    let state = controller.run_with_observer(&case.description, step_budget, |record| {
        on_step(record);
        steps.push(record.clone());
    });
    RunReport::from_state(&state, case.expected, steps, started_at)
}

/// Run every case against the configured device and oracle.
///
/// Each case gets its own frame session; a report is archived per case.
/// Archive failures are logged and do not stop the suite.
pub fn run_suite<F>(config: &SuiteConfig, cases: &[TestCase], mut on_event: F) -> HarnessResult<Vec<RunReport>>
where
    F: FnMut(SuiteEvent<'_>),
{
    if cases.is_empty() {
        return Err(HarnessError::Cases("no test cases to run".to_string()));
    }
    fs::create_dir_all(&config.screenshot_dir)?;

    let settings = config::get().agent;
    let mut reports = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        let index = i + 1;
        on_event(SuiteEvent::CaseStarted { index, case });

        let session = Session::for_case(&config.screenshot_dir, index, &case.description).keep(config.keep_frames);
        session.init()?;
        info!(session = %session.id, "case session ready");

        let device = AdbDevice::new(AdbConfig::default());
        let frames = AdbScreenshots::new(device.clone(), session.dir.clone());
        let oracle = HttpOracle::new(OracleConfig::default());
        let mut controller = RunController::new(device, frames, oracle, settings, config.app_package.clone());

        let mut report = run_case(&mut controller, case, config.step_budget, |record| {
            on_event(SuiteEvent::Step(record))
        });
        if config.keep_frames {
            report = report.with_frame_dir(&session.dir);
        }

        let report_path: Option<PathBuf> = match session.write_report(&config.log_dir, &report) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not archive run report");
                None
            }
        };
        on_event(SuiteEvent::CaseFinished {
            report: &report,
            report_path: report_path.as_deref(),
        });

        let frame_count = session.list_frames().map(|f| f.len()).unwrap_or(0);
        info!(session = %session.id, frames = frame_count, outcome = %report.outcome, "case finished");
        if let Err(e) = session.cleanup() {
            warn!(error = %e, dir = %session.dir.display(), "could not remove case frames");
        }
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_cases() {
        let cases = default_cases();
        assert_eq!(cases.len(), 4);
        let expected: Vec<_> = cases.iter().map(|c| c.expected).collect();
        assert_eq!(
            expected,
            vec![Some(Verdict::Pass), Some(Verdict::Pass), Some(Verdict::Fail), Some(Verdict::Fail)]
        );
        assert!(cases[3].description.contains("Print to PDF"));
    }

    #[test]
    fn test_load_cases() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"description": "Open settings", "expected": "pass"}}, {{"description": "Open the vault list"}}]"#
        )
        .unwrap();

        let cases = load_cases(file.path()).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected, Some(Verdict::Pass));
        assert_eq!(cases[1].expected, None);
    }

    #[test]
    fn test_load_cases_rejects_empty_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(matches!(load_cases(file.path()), Err(HarnessError::Cases(_))));
    }

    #[test]
    fn test_load_cases_rejects_incomplete_expectation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"description": "x", "expected": "incomplete"}}]"#).unwrap();
        assert!(matches!(load_cases(file.path()), Err(HarnessError::Cases(_))));
    }

    #[test]
    fn test_load_cases_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_cases(file.path()), Err(HarnessError::Serialization(_))));
    }

    #[test]
    fn test_run_suite_rejects_empty() {
        let result = run_suite(&SuiteConfig::default(), &[], |_| {});
        assert!(matches!(result, Err(HarnessError::Cases(_))));
    }
}
