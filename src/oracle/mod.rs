pub mod client;
pub mod extract;
pub mod prompt;

pub use client::{
    DecisionOracle, HttpOracle, OracleConfig, OracleError, OracleResult, build_request,
    check_reachable, reply_text,
};
pub use extract::extract_json;
pub use prompt::{planner_prompt, progress_prompt, verify_done_prompt};
