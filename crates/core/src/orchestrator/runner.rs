//! Acquisition service implementation.
//!
//! Wires the scheduler to its two phases:
//! - Session phase: launch the surface, then reuse a persisted token or log in
//! - Acquisition phase: run one attempt on the authenticated surface
//! - Release: shut the launcher down once, however the run ended

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::attempt::{AcquisitionMachine, AcquisitionReport, AttemptOutcome, StateCallback};
use crate::clock::Clock;
use crate::config::{parse_deadline, validate_config, Config, ConfigError, SanitizedConfig};
use crate::scheduler::{Schedule, ScheduleOutcome, Scheduler, SchedulerConfig};
use crate::session::{EstablishedSession, SessionManager, SessionStore};
use crate::solver::{ChallengeSolver, Solver};
use crate::surface::SurfaceLauncher;

use super::phases::AcquisitionPhases;
use super::types::{OrchestratorError, RunReport, ServiceStatus};

/// Runs one scheduled acquisition end to end.
pub struct AcquisitionService {
    config: Config,
    launcher: Arc<dyn SurfaceLauncher>,
    solver: Arc<dyn Solver>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    callback: Option<StateCallback>,

    // Runtime state
    running: AtomicBool,
    runs: AtomicU64,
}

impl AcquisitionService {
    /// Create a new service.
    pub fn new(
        config: Config,
        launcher: Arc<dyn SurfaceLauncher>,
        solver: Arc<dyn Solver>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            launcher,
            solver,
            store,
            clock,
            callback: None,
            running: AtomicBool::new(false),
            runs: AtomicU64::new(0),
        }
    }

    /// Set a callback invoked on every attempt state change.
    pub fn with_callback(mut self, callback: StateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            running: self.running.load(Ordering::SeqCst),
            runs: self.runs.load(Ordering::SeqCst),
        }
    }

    /// Validates the configuration, arms both deadlines and runs the schedule
    /// to a terminal state.
    ///
    /// Configuration problems are reported before anything is launched. Once
    /// the schedule is armed every ending, including cancellation through
    /// `cancel`, is reported in the returned [`RunReport`].
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, OrchestratorError> {
        self.exclusive(None, cancel).await
    }

    /// Like [`Self::run`], but with a session established elsewhere: the
    /// session deadline is skipped and the acquisition phase fires on schedule.
    pub async fn run_with_session(
        &self,
        session: EstablishedSession,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        self.exclusive(Some(session), cancel).await
    }

    async fn exclusive(
        &self,
        session: Option<EstablishedSession>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Acquisition service already running");
            return Err(OrchestratorError::AlreadyRunning);
        }

        let result = self.run_scheduled(session, cancel).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_scheduled(
        &self,
        session: Option<EstablishedSession>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        let started_at = self.clock.now();
        let schedule = self.prepare(started_at)?;
        let phases = Arc::new(self.phases()?);

        self.runs.fetch_add(1, Ordering::SeqCst);
        info!(
            config = ?SanitizedConfig::from(&self.config),
            "Starting acquisition service"
        );

        let mut scheduler = Scheduler::new(
            schedule,
            Arc::clone(&self.clock),
            SchedulerConfig::from(&self.config.schedule),
        );
        if let Some(session) = session {
            scheduler = scheduler.with_session(session);
        }
        let outcome = scheduler.run(phases, cancel).await;

        let finished_at = self.clock.now();
        log_outcome(&outcome);

        Ok(RunReport {
            outcome,
            started_at,
            finished_at,
        })
    }

    /// Validates the configuration and arms the schedule against `now`.
    fn prepare(&self, now: DateTime<Utc>) -> Result<Schedule, ConfigError> {
        validate_config(&self.config)?;
        let session_open = parse_deadline(&self.config.schedule.session_open)?;
        let acquisition_open = parse_deadline(&self.config.schedule.acquisition_open)?;
        Ok(Schedule::new(session_open, acquisition_open, now)?)
    }

    fn phases(&self) -> Result<AcquisitionPhases, ConfigError> {
        let solver = ChallengeSolver::new(Arc::clone(&self.solver));
        let mut machine = AcquisitionMachine::new(&self.config, solver, Arc::clone(&self.clock))?;
        if let Some(callback) = &self.callback {
            machine = machine.with_callback(Arc::clone(callback));
        }

        Ok(AcquisitionPhases {
            launcher: Arc::clone(&self.launcher),
            sessions: SessionManager::new(&self.config, Arc::clone(&self.store)),
            machine,
            headless: self.config.browser.headless,
        })
    }
}

fn log_outcome(outcome: &ScheduleOutcome<AcquisitionReport>) {
    match outcome {
        ScheduleOutcome::Completed(report) => match &report.outcome {
            AttemptOutcome::Succeeded { confirmation } => info!(
                attempt = %report.attempt.id,
                confirmation = ?confirmation,
                "Acquisition succeeded"
            ),
            other => warn!(
                attempt = %report.attempt.id,
                outcome = %other,
                "Acquisition did not succeed"
            ),
        },
        ScheduleOutcome::SessionFailed(cause) => {
            warn!("Run ended without an acquisition attempt: session failed: {}", cause)
        }
        ScheduleOutcome::Cancelled { phase } => match phase {
            Some(phase) => info!(phase = %phase, "Run cancelled"),
            None => info!("Run cancelled before any phase fired"),
        },
        ScheduleOutcome::PhasePanicked { phase, message } => {
            warn!(phase = %phase, "Run ended by a panicking phase: {}", message)
        }
    }
}
