mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str, parse_deadline};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

use crate::scheduler::ScheduleError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid deadline '{value}': {reason}")]
    InvalidDeadline { value: String, reason: String },

    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
}
