//! Bounded waits.
//!
//! Every suspension point in the workflow goes through these helpers so that
//! no wait is unbounded and every wait observes the stop signal.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::SurfaceError;

/// Polls `probe` every `interval` until it yields `Some`, the `timeout`
/// elapses, or `cancel` fires.
///
/// The probe runs at least once, immediately. Probe errors end the wait.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, SurfaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, SurfaceError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(SurfaceError::Cancelled);
        }

        if let Some(value) = probe().await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(SurfaceError::timeout(what, timeout));
        }

        let nap = interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Err(SurfaceError::Cancelled),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

/// Runs `fut`, giving up with [`SurfaceError::Cancelled`] if `cancel` fires first.
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T, SurfaceError>
where
    Fut: Future<Output = Result<T, SurfaceError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SurfaceError::Cancelled),
        result = fut => result,
    }
}

/// Sleeps for `duration` unless `cancel` fires first.
pub async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<(), SurfaceError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SurfaceError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
