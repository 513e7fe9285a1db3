//! Error types for the scheduler.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::Phase;

/// A schedule that cannot be armed.
#[derive(Debug, Clone, Error)]
pub enum ScheduleError {
    #[error("{phase} deadline {at} is already past (now {now})")]
    DeadlinePassed {
        phase: Phase,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("session-open ({session_open}) must precede acquisition-open ({acquisition_open})")]
    OutOfOrder {
        session_open: DateTime<Utc>,
        acquisition_open: DateTime<Utc>,
    },
}
