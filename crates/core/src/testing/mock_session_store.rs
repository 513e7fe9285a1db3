//! Mock session store for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::session::{SessionStore, SessionToken, StoreError};

/// Mock implementation of the SessionStore trait.
///
/// Holds at most one token in memory and records every save and discard.
#[derive(Debug)]
pub struct MockSessionStore {
    /// The currently stored token.
    stored: Arc<RwLock<Option<SessionToken>>>,
    /// Every token passed to `save`.
    saved: Arc<RwLock<Vec<SessionToken>>>,
    discards: Arc<RwLock<usize>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<StoreError>>>,
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            stored: Arc::new(RwLock::new(None)),
            saved: Arc::new(RwLock::new(Vec::new())),
            discards: Arc::new(RwLock::new(0)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: SessionToken) -> Self {
        Self {
            stored: Arc::new(RwLock::new(Some(token))),
            ..Self::new()
        }
    }

    /// Get the currently stored token.
    pub async fn stored(&self) -> Option<SessionToken> {
        self.stored.read().await.clone()
    }

    /// Get every token that was saved, in order.
    pub async fn saved(&self) -> Vec<SessionToken> {
        self.saved.read().await.clone()
    }

    /// Get the number of discards performed.
    pub async fn discard_count(&self) -> usize {
        *self.discards.read().await
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: StoreError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Result<(), StoreError> {
        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, StoreError> {
        self.take_error().await?;
        // Loaded tokens start out with unknown validity.
        Ok(self
            .stored
            .read()
            .await
            .as_ref()
            .map(|token| SessionToken::new(token.bytes())))
    }

    async fn save(&self, token: &SessionToken) -> Result<(), StoreError> {
        self.take_error().await?;
        *self.stored.write().await = Some(token.clone());
        self.saved.write().await.push(token.clone());
        Ok(())
    }

    async fn discard(&self) -> Result<(), StoreError> {
        self.take_error().await?;
        *self.stored.write().await = None;
        *self.discards.write().await += 1;
        Ok(())
    }
}
