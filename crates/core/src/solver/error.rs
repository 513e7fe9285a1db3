//! Error types for the solver module.

use thiserror::Error;

/// Errors from challenge recognition.
///
/// A wrong answer is not an error; only unusable input or an unreachable
/// recognizer is.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The challenge image could not be decoded.
    #[error("invalid challenge image: {0}")]
    InvalidImage(String),

    /// The recognition service failed or answered with something unusable.
    #[error("solver service error: {0}")]
    Service(String),

    /// The pre-processed image could not be re-encoded.
    #[error("failed to encode image: {0}")]
    Encode(String),
}
