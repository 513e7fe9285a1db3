//! Types for the timed scheduler.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The two timed phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    SessionOpen,
    AcquisitionOpen,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::SessionOpen => "session-open",
            Phase::AcquisitionOpen => "acquisition-open",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wall-clock instant tagged with the phase it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deadline {
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

/// Lifecycle of one deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    /// Waiting for its instant.
    Armed,
    /// Its instant passed and the phase was started.
    Fired,
    /// The phase's work was supplied up front; it never fires.
    Satisfied,
}

/// How a scheduled run ended.
#[derive(Debug)]
pub enum ScheduleOutcome<T> {
    /// The acquisition phase ran to completion.
    Completed(T),
    /// The session phase failed, so acquisition never ran.
    SessionFailed(String),
    /// The run was cancelled; `phase` is the phase that was executing, if any.
    Cancelled { phase: Option<Phase> },
    /// A phase task panicked.
    PhasePanicked { phase: Phase, message: String },
}

impl<T> ScheduleOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            ScheduleOutcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn into_completed(self) -> Option<T> {
        match self {
            ScheduleOutcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            ScheduleOutcome::Completed(_) => "completed".to_string(),
            ScheduleOutcome::SessionFailed(_) => "session-failed".to_string(),
            ScheduleOutcome::Cancelled { phase: Some(phase) } => format!("cancelled:{}", phase),
            ScheduleOutcome::Cancelled { phase: None } => "cancelled".to_string(),
            ScheduleOutcome::PhasePanicked { phase, .. } => format!("panicked:{}", phase),
        }
    }
}
