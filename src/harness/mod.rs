pub mod suite;
pub mod types;

pub use suite::{SuiteEvent, default_cases, load_cases, run_case, run_suite};
pub use types::{HarnessError, HarnessResult, SuiteConfig, TestCase};
