//! Error types for the attempt module.

use thiserror::Error;

use crate::surface::SurfaceError;

use super::types::{AttemptOutcome, AttemptState, CommitStep, FailureClass, FailureTag};

/// Errors from the commit sequence.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A step's control never appeared, or its option does not exist.
    #[error("commit step '{step}' missing: {reason}")]
    StepMissing { step: CommitStep, reason: String },

    /// The surface failed during a step.
    #[error("commit step '{step}' failed: {source}")]
    Surface {
        step: CommitStep,
        #[source]
        source: SurfaceError,
    },

    /// The run was stopped.
    #[error("commit cancelled")]
    Cancelled,
}

impl CommitError {
    pub(crate) fn from_surface(step: CommitStep, err: SurfaceError) -> Self {
        match err {
            SurfaceError::Cancelled => Self::Cancelled,
            SurfaceError::Timeout { .. } | SurfaceError::NotFound(_) => Self::StepMissing {
                step,
                reason: err.to_string(),
            },
            source => Self::Surface { step, source },
        }
    }
}

/// Why a stage stopped the attempt.
#[derive(Debug)]
pub(crate) enum StageFailure {
    Failed {
        tag: FailureTag,
        class: FailureClass,
        cause: String,
    },
    Cancelled,
}

impl StageFailure {
    pub fn failed(tag: FailureTag, cause: impl Into<String>) -> Self {
        Self::Failed {
            tag,
            class: tag.default_class(),
            cause: cause.into(),
        }
    }

    /// A surface error in `state`, classified by what went wrong.
    pub fn surface(state: AttemptState, err: SurfaceError) -> Self {
        let class = match &err {
            SurfaceError::Cancelled => return Self::Cancelled,
            SurfaceError::Script { .. } | SurfaceError::NotFound(_) => {
                FailureClass::ContractMismatch
            }
            _ => FailureClass::Environment,
        };
        Self::Failed {
            tag: FailureTag::Stage(state),
            class,
            cause: err.to_string(),
        }
    }

    pub fn into_outcome(self) -> AttemptOutcome {
        match self {
            StageFailure::Failed { tag, class, cause } => {
                AttemptOutcome::Failed { tag, class, cause }
            }
            StageFailure::Cancelled => AttemptOutcome::cancelled(),
        }
    }
}

impl From<CommitError> for StageFailure {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::StepMissing { step, reason } => {
                StageFailure::failed(FailureTag::CommitStepMissing(step), reason)
            }
            CommitError::Surface { source, .. } => {
                StageFailure::surface(AttemptState::Committing, source)
            }
            CommitError::Cancelled => StageFailure::Cancelled,
        }
    }
}
