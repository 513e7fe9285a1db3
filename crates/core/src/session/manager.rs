//! Session establishment.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, CredentialsConfig, SessionConfig, TargetConfig};
use crate::surface::{cancellable, pause, poll_until, Selector, Surface, SurfaceError};

use super::error::SessionError;
use super::traits::SessionStore;
use super::types::{EstablishedSession, SessionToken, TokenValidity};

const LOCATION_POLL: Duration = Duration::from_millis(250);

/// Produces an authenticated surface, reusing a persisted token when it still works.
pub struct SessionManager {
    credentials: CredentialsConfig,
    target: TargetConfig,
    session: SessionConfig,
    username_field: Selector,
    password_field: Selector,
    submit: Selector,
    entry_ready: Duration,
    post_submit: Duration,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(config: &Config, store: Arc<dyn SessionStore>) -> Self {
        Self {
            credentials: config.credentials.clone(),
            target: config.target.clone(),
            session: config.session.clone(),
            username_field: Selector::from(&config.selectors.login_username),
            password_field: Selector::from(&config.selectors.login_password),
            submit: Selector::from(&config.selectors.login_submit),
            entry_ready: Duration::from_secs(config.timeouts.entry_ready_secs),
            post_submit: Duration::from_secs(config.timeouts.post_submit_secs),
            store,
        }
    }

    /// Loads the persisted token. Store failures are logged and treated as "no token".
    pub async fn load_persisted(&self) -> Option<SessionToken> {
        match self.store.load().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to load persisted session, logging in fresh: {}", e);
                None
            }
        }
    }

    /// Authenticates `surface`, trying `persisted` first.
    ///
    /// On success the surface is left at the event location.
    pub async fn establish(
        &self,
        surface: Arc<dyn Surface>,
        persisted: Option<SessionToken>,
        cancel: &CancellationToken,
    ) -> Result<EstablishedSession, SessionError> {
        if let Some(mut token) = persisted {
            if self.probe_token(surface.as_ref(), &token, cancel).await? {
                token.mark(TokenValidity::Valid);
                info!(surface = surface.id(), "Persisted session accepted");
                return Ok(EstablishedSession {
                    surface,
                    token,
                    reused: true,
                });
            }

            token.mark(TokenValidity::Invalid);
            warn!("Persisted session rejected, discarding it");
            if let Err(e) = self.store.discard().await {
                warn!("Failed to discard rejected session: {}", e);
            }
        }

        self.login(surface.as_ref(), cancel).await?;

        let token = cancellable(cancel, surface.export_session())
            .await?
            .into_valid();
        if let Err(e) = self.store.save(&token).await {
            warn!("Failed to persist session: {}", e);
        }

        let location = cancellable(cancel, surface.current_location()).await?;
        if location != self.target.event_location {
            cancellable(cancel, surface.navigate(&self.target.event_location)).await?;
        }

        info!(surface = surface.id(), "Session established");
        Ok(EstablishedSession {
            surface,
            token,
            reused: false,
        })
    }

    /// Applies `token` and checks whether the event location is reachable without
    /// being sent back to the entry point.
    async fn probe_token(
        &self,
        surface: &dyn Surface,
        token: &SessionToken,
        cancel: &CancellationToken,
    ) -> Result<bool, SessionError> {
        cancellable(cancel, surface.apply_session(token)).await?;
        cancellable(cancel, surface.navigate(&self.target.event_location)).await?;
        let location = cancellable(cancel, surface.current_location()).await?;
        let authenticated = !self.at_entry(&location);
        debug!(location = %location, authenticated, "Probed persisted session");
        Ok(authenticated)
    }

    async fn login(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.open_entry(surface, cancel).await?;

        let username = cancellable(
            cancel,
            surface.wait_for_control(&self.username_field, self.entry_ready),
        )
        .await?;
        cancellable(cancel, surface.type_text(&username, &self.credentials.username)).await?;

        let password = cancellable(
            cancel,
            surface.wait_for_control(&self.password_field, self.entry_ready),
        )
        .await?;
        cancellable(cancel, surface.type_text(&password, &self.credentials.password)).await?;

        let submit =
            cancellable(cancel, surface.wait_for_control(&self.submit, self.entry_ready)).await?;
        cancellable(cancel, surface.click(&submit)).await?;

        let left_entry = poll_until(
            "location to leave the entry point",
            self.post_submit,
            LOCATION_POLL,
            cancel,
            move || async move {
                let location = surface.current_location().await?;
                Ok((!self.at_entry(&location)).then_some(location))
            },
        )
        .await;

        match left_entry {
            Ok(location) => {
                debug!(location = %location, "Left entry point after submitting credentials");
                Ok(())
            }
            Err(SurfaceError::Timeout { .. }) => Err(SessionError::Auth(
                "still at the entry point after submitting credentials".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Navigates to the entry point until its submit control is ready, backing
    /// off linearly between attempts.
    async fn open_entry(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let attempts = self.session.entry_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;

            let ready = async {
                surface.navigate(&self.target.entry_location).await?;
                surface.wait_for_control(&self.submit, self.entry_ready).await
            };
            let reason = match cancellable(cancel, ready).await {
                Ok(_) => return Ok(()),
                Err(SurfaceError::Timeout { what, after }) => {
                    format!("timed out after {:?} waiting for {}", after, what)
                }
                Err(e) => return Err(e.into()),
            };

            if attempt >= attempts {
                return Err(SessionError::Transient(reason));
            }

            let backoff = Duration::from_secs(self.session.entry_backoff_secs * attempt as u64);
            warn!(
                attempt,
                attempts,
                backoff_secs = backoff.as_secs(),
                "Entry point not ready ({}), retrying",
                reason
            );
            pause(cancel, backoff).await?;
        }
    }

    fn at_entry(&self, location: &str) -> bool {
        location.contains(&self.target.entry_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockSessionStore, MockSurface};

    const EVENT: &str = "https://tickets.example/event/42";
    const ENTRY: &str = "https://accounts.example/login";

    fn manager(store: Arc<MockSessionStore>) -> SessionManager {
        SessionManager::new(&fixtures::config(), store)
    }

    /// A surface whose entry point accepts "alice"/"hunter2" and which
    /// redirects to the entry point unless the session cookie is present.
    fn site() -> Arc<MockSurface> {
        let surface = Arc::new(MockSurface::new("parent"));
        fixtures::wire_login(&surface, EVENT, ENTRY);
        surface
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_token_skips_login() {
        let store = Arc::new(MockSessionStore::new());
        let surface = site();
        let cancel = CancellationToken::new();

        let session = manager(store.clone())
            .establish(surface.clone(), Some(fixtures::valid_token()), &cancel)
            .await
            .unwrap();

        assert!(session.reused);
        assert_eq!(session.token.validity(), TokenValidity::Valid);
        assert!(surface.typed().is_empty());
        assert_eq!(store.discard_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_token_is_discarded_and_login_runs() {
        let store = Arc::new(MockSessionStore::new());
        let surface = site();
        let cancel = CancellationToken::new();

        let session = manager(store.clone())
            .establish(surface.clone(), Some(SessionToken::new(b"stale".to_vec())), &cancel)
            .await
            .unwrap();

        assert!(!session.reused);
        assert_eq!(store.discard_count().await, 1);
        assert_eq!(store.saved().await.len(), 1);
        assert_eq!(surface.typed().len(), 2);
        assert_eq!(surface.location(), EVENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_token_logs_in() {
        let store = Arc::new(MockSessionStore::new());
        let surface = site();
        let cancel = CancellationToken::new();

        let session = manager(store.clone())
            .establish(surface.clone(), None, &cancel)
            .await
            .unwrap();

        assert!(!session.reused);
        let typed = surface.typed();
        assert_eq!(typed[0], ("#username".to_string(), "alice".to_string()));
        assert_eq!(typed[1], ("#password".to_string(), "hunter2".to_string()));
        assert!(surface.clicks().contains(&"#login-submit".to_string()));
        assert_eq!(store.saved().await[0].bytes(), fixtures::valid_token().bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credentials_are_fatal() {
        let store = Arc::new(MockSessionStore::new());
        let surface = Arc::new(MockSurface::new("parent"));
        // The entry point is ready but submitting never leaves it.
        surface.add_control("#username");
        surface.add_control("#password");
        surface.add_control("#login-submit");

        let result = manager(store.clone())
            .establish(surface.clone(), None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SessionError::Auth(_))));
        assert!(store.saved().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_point_retried_with_backoff() {
        let store = Arc::new(MockSessionStore::new());
        let surface = Arc::new(MockSurface::new("parent"));
        let started = tokio::time::Instant::now();

        let result = manager(store)
            .establish(surface.clone(), None, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SessionError::Transient(_))));
        assert_eq!(surface.navigations().len(), 3);
        // Three 15s readiness waits plus 30s and 60s of back-off.
        assert!(started.elapsed() >= Duration::from_secs(3 * 15 + 30 + 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let store = Arc::new(MockSessionStore::new());
        let surface = Arc::new(MockSurface::new("parent"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(20)).await;
            trigger.cancel();
        });

        let result = manager(store).establish(surface, None, &cancel).await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
    }
}
