//! Error types for the surface module.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`super::Surface`] or by the bounded waits built on it.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// A bounded wait for a readiness signal expired.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// A control or frame does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Navigation to a location failed.
    #[error("navigation to {location} failed: {reason}")]
    Navigation { location: String, reason: String },

    /// A script failed to run or returned an unexpected shape.
    #[error("script '{script}' failed: {reason}")]
    Script { script: String, reason: String },

    /// The surface has been closed.
    #[error("surface closed")]
    Closed,

    /// The wait was interrupted by the run's stop signal.
    #[error("cancelled")]
    Cancelled,

    /// Any other driver failure.
    #[error("surface error: {0}")]
    Other(String),
}

impl SurfaceError {
    /// Creates a timeout error.
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Creates a script error.
    pub fn script(script: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Script {
            script: script.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is an expired readiness wait (a transient condition).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
