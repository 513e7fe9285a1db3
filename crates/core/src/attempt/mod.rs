//! Acquisition attempt: the forward-only state machine that takes an
//! authenticated surface from the event page to a submitted order.
//!
//! The machine opens the reservation popup, solves the challenge shown there,
//! holds a unit in the allocation frame and runs the commit steps. Every
//! attempt ends in exactly one [`AttemptOutcome`].

mod challenge;
mod commit;
mod error;
mod machine;
mod types;

pub use commit::CommitSequencer;
pub use error::CommitError;
pub use machine::AcquisitionMachine;
pub use types::{
    AcquisitionAttempt, AcquisitionReport, AttemptOutcome, AttemptState, CommitStep,
    FailureClass, FailureTag, StateCallback, Transition,
};
