//! Mock challenge solver for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::solver::{Solver, SolverError};

/// Mock implementation of the Solver trait.
///
/// Answers are handed out in order; once they run out the last answer
/// repeats. Every image passed to `classify` is recorded.
///
/// # Example
///
/// ```rust,ignore
/// use curtaincall_core::testing::MockSolver;
///
/// // Wrong three times, then right.
/// let solver = MockSolver::with_answers(vec!["WRNG", "WRNG", "WRNG", "ABCD"]);
/// ```
#[derive(Debug)]
pub struct MockSolver {
    answers: Arc<RwLock<Vec<String>>>,
    images: Arc<RwLock<Vec<Vec<u8>>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<SolverError>>>,
}

impl Default for MockSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSolver {
    /// Create a mock solver that always answers with an empty string.
    pub fn new() -> Self {
        Self::with_answers(Vec::new())
    }

    /// Create a mock solver that answers with `answers` in order.
    pub fn with_answers(answers: Vec<&str>) -> Self {
        Self {
            answers: Arc::new(RwLock::new(
                answers.into_iter().map(str::to_string).collect(),
            )),
            images: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get every image the solver was asked to classify.
    pub async fn recorded_images(&self) -> Vec<Vec<u8>> {
        self.images.read().await.clone()
    }

    /// Get the number of classify calls.
    pub async fn call_count(&self) -> usize {
        self.images.read().await.len()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: SolverError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Solver for MockSolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify(&self, png: &[u8]) -> Result<String, SolverError> {
        let call = {
            let mut images = self.images.write().await;
            images.push(png.to_vec());
            images.len()
        };

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let answers = self.answers.read().await;
        let answer = answers
            .get(call - 1)
            .or_else(|| answers.last())
            .cloned()
            .unwrap_or_default();
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answers_in_order_then_repeat() {
        let solver = MockSolver::with_answers(vec!["A", "B"]);
        assert_eq!(solver.classify(b"1").await.unwrap(), "A");
        assert_eq!(solver.classify(b"2").await.unwrap(), "B");
        assert_eq!(solver.classify(b"3").await.unwrap(), "B");
        assert_eq!(solver.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_next_error() {
        let solver = MockSolver::with_answers(vec!["A"]);
        solver
            .set_next_error(SolverError::Service("down".to_string()))
            .await;
        assert!(solver.classify(b"1").await.is_err());
        assert_eq!(solver.classify(b"2").await.unwrap(), "A");
    }
}
