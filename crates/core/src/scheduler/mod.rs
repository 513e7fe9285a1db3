//! Timed scheduler: fires the session phase and then the acquisition phase
//! at their wall-clock deadlines.
//!
//! Each deadline fires at most once. The acquisition phase never starts
//! before the session phase has produced a session, and the handler's
//! `release` runs exactly once however the run ends.

mod config;
mod error;
mod runner;
mod schedule;
mod traits;
mod types;

pub use config::SchedulerConfig;
pub use error::ScheduleError;
pub use runner::Scheduler;
pub use schedule::Schedule;
pub use traits::PhaseHandler;
pub use types::{Deadline, Phase, ScheduleOutcome, SlotState};
