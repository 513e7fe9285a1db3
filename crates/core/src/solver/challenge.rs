//! Adapter between raw challenge images and a [`Solver`].

use std::sync::Arc;

use tracing::debug;

use super::error::SolverError;
use super::preprocess::flatten_to_png;
use super::traits::Solver;
use super::types::ChallengeArtifact;

/// Prepares challenge images and normalizes the recognizer's answer.
#[derive(Clone)]
pub struct ChallengeSolver {
    solver: Arc<dyn Solver>,
}

impl ChallengeSolver {
    pub fn new(solver: Arc<dyn Solver>) -> Self {
        Self { solver }
    }

    /// Name of the underlying recognizer.
    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    /// Recognizes the text in a raw challenge image.
    ///
    /// The answer is trimmed and upper-cased. Whether it is correct is only
    /// known once the surface accepts or rejects it.
    pub async fn solve(&self, image: &[u8]) -> Result<String, SolverError> {
        let png = flatten_to_png(image)?;
        let raw = self.solver.classify(&png).await?;
        let text = normalize(&raw);
        debug!(solver = self.solver.name(), raw = %raw, text = %text, "Challenge recognized");
        Ok(text)
    }

    /// Like [`solve`](Self::solve), storing the answer on the artifact.
    /// On error the artifact's text is left untouched.
    pub async fn solve_artifact(
        &self,
        artifact: &mut ChallengeArtifact,
    ) -> Result<(), SolverError> {
        artifact.text = self.solve(&artifact.image).await?;
        Ok(())
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<String>().to_uppercase()
}
