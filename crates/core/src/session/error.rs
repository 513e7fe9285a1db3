//! Error types for the session module.

use std::path::PathBuf;
use thiserror::Error;

use crate::surface::SurfaceError;

/// Errors from establishing an authenticated session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials were rejected. Retrying will not help.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The entry point never became ready.
    #[error("entry point unavailable: {0}")]
    Transient(String),

    /// Any other surface failure.
    #[error("surface error: {0}")]
    Surface(SurfaceError),

    /// The run was stopped.
    #[error("session establishment cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether retrying the whole establishment could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<SurfaceError> for SessionError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::Cancelled => Self::Cancelled,
            other => Self::Surface(other),
        }
    }
}

/// Errors from the persisted token store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read the stored token.
    #[error("failed to read session store {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the stored token.
    #[error("failed to write session store {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other store failure.
    #[error("session store error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_surface_error() {
        let err: SessionError = SurfaceError::Cancelled.into();
        assert!(matches!(err, SessionError::Cancelled));

        let err: SessionError = SurfaceError::timeout("#login", Duration::from_secs(1)).into();
        assert!(matches!(err, SessionError::Surface(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::Auth("still at entry point".to_string());
        assert_eq!(err.to_string(), "authentication failed: still at entry point");
        assert!(SessionError::Transient("slow".to_string()).is_retryable());
    }
}
