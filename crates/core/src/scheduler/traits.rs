//! Trait definitions for the scheduler.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Work run when each deadline fires.
///
/// Both phases run on spawned tasks. `release` runs exactly once when the
/// schedule reaches a terminal state, whichever way it got there.
#[async_trait]
pub trait PhaseHandler: Send + Sync + 'static {
    /// What the session phase hands to the acquisition phase.
    type Session: Send + 'static;
    /// Result of the acquisition phase.
    type Output: Send + 'static;
    type Error: fmt::Display + Send + 'static;

    async fn on_session(&self, cancel: CancellationToken) -> Result<Self::Session, Self::Error>;

    async fn on_acquisition(
        &self,
        session: Self::Session,
        cancel: CancellationToken,
    ) -> Self::Output;

    async fn release(&self);
}
