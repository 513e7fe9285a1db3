//! Types for the acquisition service.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::attempt::{AcquisitionReport, AttemptOutcome};
use crate::config::ConfigError;
use crate::scheduler::ScheduleOutcome;

/// Errors that stop a run before anything is scheduled.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Invalid configuration, including deadlines that are out of order or past.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `run` was called while another run of the same service was in progress.
    #[error("acquisition service already running")]
    AlreadyRunning,
}

/// What a whole run produced.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: ScheduleOutcome<AcquisitionReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// The attempt outcome, when the acquisition phase ran to completion.
    pub fn attempt_outcome(&self) -> Option<&AttemptOutcome> {
        self.outcome.completed().map(|report| &report.outcome)
    }

    pub fn succeeded(&self) -> bool {
        self.attempt_outcome()
            .is_some_and(|outcome| outcome.is_success())
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Current status of the service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStatus {
    /// Whether a run is in progress.
    pub running: bool,
    /// Number of runs started by this service.
    pub runs: u64,
}
