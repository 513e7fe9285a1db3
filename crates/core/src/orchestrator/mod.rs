//! Acquisition service: one scheduled run, end to end.
//!
//! The service drives the scheduler with two phases:
//! - **Session**: at session-open, launch the surface and authenticate it
//! - **Acquisition**: at acquisition-open, run the attempt state machine
//!
//! The surface launcher is shut down exactly once whichever path ends the run.

mod phases;
mod runner;
mod types;

pub use runner::AcquisitionService;
pub use types::{OrchestratorError, RunReport, ServiceStatus};
