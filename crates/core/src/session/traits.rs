//! Trait definitions for the session module.

use async_trait::async_trait;

use super::error::StoreError;
use super::types::SessionToken;

/// Persistence for the session token between runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the stored token, if any. Loaded tokens have unknown validity.
    async fn load(&self) -> Result<Option<SessionToken>, StoreError>;

    /// Replaces the stored token.
    async fn save(&self, token: &SessionToken) -> Result<(), StoreError>;

    /// Removes the stored token. Removing a missing token is not an error.
    async fn discard(&self) -> Result<(), StoreError>;
}
