use crate::frame::FrameError;
use crate::oracle::OracleError;

use super::outcome::FailureCause;

/// Errors raised while producing a step's action
#[derive(Debug)]
pub enum StepError {
    /// The decision oracle failed or replied with something unusable
    Oracle(OracleError),
    /// The current frame could not be captured or read
    Frame(FrameError),
    /// The oracle named an action outside the vocabulary, or omitted its fields
    Contract(String),
}

impl StepError {
    /// Failure category recorded on the execution result
    pub fn cause(&self) -> FailureCause {
        match self {
            StepError::Oracle(e) if e.is_parse() => FailureCause::OracleParse,
            StepError::Oracle(_) => FailureCause::OracleUnavailable,
            StepError::Frame(_) => FailureCause::FrameCapture,
            StepError::Contract(_) => FailureCause::ContractViolation,
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::Oracle(e) => write!(f, "Decision oracle: {}", e),
            StepError::Frame(e) => write!(f, "Frame: {}", e),
            StepError::Contract(msg) => write!(f, "Contract violation: {}", msg),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Oracle(e) => Some(e),
            StepError::Frame(e) => Some(e),
            StepError::Contract(_) => None,
        }
    }
}

impl From<OracleError> for StepError {
    fn from(e: OracleError) -> Self {
        StepError::Oracle(e)
    }
}

impl From<FrameError> for StepError {
    fn from(e: FrameError) -> Self {
        StepError::Frame(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_mapping() {
        assert_eq!(
            StepError::Oracle(OracleError::Parse("x".into())).cause(),
            FailureCause::OracleParse
        );
        assert_eq!(
            StepError::Oracle(OracleError::ConnectionFailed("x".into())).cause(),
            FailureCause::OracleUnavailable
        );
        assert_eq!(
            StepError::Frame(FrameError::Capture("x".into())).cause(),
            FailureCause::FrameCapture
        );
        assert_eq!(StepError::Contract("x".into()).cause(), FailureCause::ContractViolation);
    }

    #[test]
    fn test_display() {
        let err = StepError::Contract("unknown action 'fly'".into());
        assert_eq!(err.to_string(), "Contract violation: unknown action 'fly'");
    }
}
