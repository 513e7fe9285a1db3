//! Error types for the search module.

use thiserror::Error;

use crate::surface::SurfaceError;

/// Errors from searching the allocation.
///
/// Finding nothing available is not an error; see [`super::SearchReport::held`].
#[derive(Debug, Error)]
pub enum SearchError {
    /// The partition view offered nothing interactive.
    #[error("no interactive partitions")]
    NoPartitions,

    /// The surface failed while searching.
    #[error("surface error: {0}")]
    Surface(SurfaceError),

    /// The run was stopped.
    #[error("search cancelled")]
    Cancelled,
}

impl From<SurfaceError> for SearchError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::Cancelled => Self::Cancelled,
            other => Self::Surface(other),
        }
    }
}
