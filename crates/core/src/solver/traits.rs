//! Trait definitions for the solver module.

use async_trait::async_trait;

use super::error::SolverError;

/// A text recognizer for challenge images.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Returns the name of this solver implementation.
    fn name(&self) -> &str;

    /// Recognizes the text in a PNG image.
    async fn classify(&self, png: &[u8]) -> Result<String, SolverError>;
}
