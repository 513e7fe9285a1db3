//! Challenge solver adapter.
//!
//! Turns a challenge image delivered by the surface into candidate text:
//! decode, flatten onto an opaque background, hand the PNG to a [`Solver`],
//! normalize the answer. Recognition accuracy is judged later by the surface,
//! not here.
//!
//! # Example
//!
//! ```ignore
//! use curtaincall_core::solver::{decode_data_url, ChallengeSolver, HttpSolver};
//!
//! let solver = ChallengeSolver::new(Arc::new(HttpSolver::new(&config.solver.unwrap())?));
//! let bytes = decode_data_url(&src)?;
//! let text = solver.solve(&bytes).await?;
//! ```

mod challenge;
mod error;
mod http;
mod preprocess;
mod traits;
mod types;

pub use challenge::ChallengeSolver;
pub use error::SolverError;
pub use http::HttpSolver;
pub use preprocess::{decode_data_url, flatten_to_png};
pub use traits::Solver;
pub use types::ChallengeArtifact;
