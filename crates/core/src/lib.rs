pub mod attempt;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod solver;
pub mod surface;
pub mod testing;

pub use attempt::{
    AcquisitionAttempt, AcquisitionMachine, AcquisitionReport, AttemptOutcome, AttemptState,
    FailureClass, FailureTag, StateCallback,
};
pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use orchestrator::{AcquisitionService, OrchestratorError, RunReport, ServiceStatus};
pub use scheduler::{
    Deadline, Phase, PhaseHandler, Schedule, ScheduleError, ScheduleOutcome, Scheduler,
    SchedulerConfig,
};
pub use search::{AllocationSearch, Partition, SearchError, SearchReport};
pub use session::{
    EstablishedSession, FileSessionStore, SessionError, SessionManager, SessionStore,
    SessionToken, StoreError, TokenValidity,
};
pub use solver::{ChallengeSolver, HttpSolver, Solver, SolverError};
pub use surface::{Control, Script, ScriptKind, Selector, Surface, SurfaceError, SurfaceLauncher};
