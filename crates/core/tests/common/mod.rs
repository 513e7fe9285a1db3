//! Shared harness for the scenario tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

use curtaincall_core::{
    testing::{fixtures, MockClock, MockLauncher, MockSessionStore, MockSolver, MockVenue},
    AcquisitionService, AttemptState, Config, SessionToken,
};

/// Wall-clock instant every scenario starts from.
pub fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 11, 55, 0).unwrap()
}

/// Every mock a run touches, plus the config the service is built from.
pub struct Harness {
    pub venue: MockVenue,
    pub launcher: Arc<MockLauncher>,
    pub solver: Arc<MockSolver>,
    pub store: Arc<MockSessionStore>,
    pub clock: Arc<MockClock>,
    pub config: Config,
    /// Attempt states reported through the callback, in order.
    pub states: Arc<Mutex<Vec<AttemptState>>>,
    _artifacts: TempDir,
}

impl Harness {
    /// A run with the session deadline at T+0 and the acquisition deadline
    /// at T+5s, no persisted token, and a solver that answers correctly.
    pub fn new(venue: MockVenue) -> Self {
        Self::with_store(venue, MockSessionStore::new())
    }

    /// Like [`Harness::new`], but the store already holds a valid token.
    pub fn with_valid_token(venue: MockVenue) -> Self {
        Self::with_store(venue, MockSessionStore::with_token(fixtures::valid_token()))
    }

    fn with_store(venue: MockVenue, store: MockSessionStore) -> Self {
        let artifacts = TempDir::new().expect("Failed to create temp dir");

        let mut config = fixtures::config();
        config.schedule.session_open = base().to_rfc3339();
        config.schedule.acquisition_open = (base() + TimeDelta::seconds(5)).to_rfc3339();
        config.artifacts.dir = artifacts.path().to_path_buf();

        Self {
            launcher: Arc::new(MockLauncher::new(venue.parent.clone())),
            solver: Arc::new(MockSolver::with_answers(vec!["abcd"])),
            store: Arc::new(store),
            clock: Arc::new(MockClock::new(base())),
            config,
            states: Arc::new(Mutex::new(Vec::new())),
            venue,
            _artifacts: artifacts,
        }
    }

    pub fn with_solver(mut self, solver: MockSolver) -> Self {
        self.solver = Arc::new(solver);
        self
    }

    /// Build the service from the current config.
    pub fn service(&self) -> AcquisitionService {
        let states = Arc::clone(&self.states);
        AcquisitionService::new(
            self.config.clone(),
            self.launcher.clone(),
            self.solver.clone(),
            self.store.clone(),
            self.clock.clone(),
        )
        .with_callback(Arc::new(move |_attempt: &str, state: AttemptState| {
            states.lock().unwrap().push(state);
        }))
    }

    pub fn states(&self) -> Vec<AttemptState> {
        self.states.lock().unwrap().clone()
    }

    pub async fn saved_tokens(&self) -> Vec<SessionToken> {
        self.store.saved().await
    }
}
