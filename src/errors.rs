use thiserror::Error;

use crate::context::ParmsId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeError {
    #[error("invalid encryption parameters: {reason}")]
    Configuration { reason: String },

    #[error("parameter mismatch: expected level {expected}, got {actual}")]
    LevelMismatch { expected: ParmsId, actual: ParmsId },

    #[error("invalid state: {reason}")]
    State { reason: String },

    #[error("arithmetic overflow: {reason}")]
    ArithmeticOverflow { reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("scale mismatch: expected {expected:.2}, got {actual:.2}")]
    ScaleMismatch { expected: f64, actual: f64 },
}

pub type HeResult<T> = Result<T, HeError>;

impl HeError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn state(reason: impl Into<String>) -> Self {
        Self::State {
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(reason: impl Into<String>) -> Self {
        Self::ArithmeticOverflow {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Fails with `LevelMismatch` unless both fingerprints are equal.
pub(crate) fn ensure_same_level(expected: &ParmsId, actual: &ParmsId) -> HeResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HeError::LevelMismatch {
            expected: *expected,
            actual: *actual,
        })
    }
}
