use super::{loader::parse_deadline, types::Config, ConfigError};

/// Slowest coarse poll that still checks the clock at least once a second.
const MAX_COARSE_POLL_MS: u64 = 1000;

/// Slowest fine poll that still checks the clock at 20 Hz.
const MAX_FINE_POLL_MS: u64 = 50;

/// Validate configuration
/// Currently validates:
/// - Credentials are present
/// - Phone number splits into three numeric parts
/// - Both deadlines parse and session_open < acquisition_open
/// - Polling rates meet the scheduler precision tiers
/// - Retry counts and waits are non-zero
///
/// Whether the deadlines are still in the future is checked when the
/// schedule is built, against the clock the run uses.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.credentials.username.trim().is_empty() || config.credentials.password.is_empty() {
        return Err(ConfigError::ValidationError(
            "credentials.username and credentials.password must be set".to_string(),
        ));
    }

    if config.contact.phone_parts().is_none() {
        return Err(ConfigError::ValidationError(
            "contact.phone must have three numeric parts separated by '-'".to_string(),
        ));
    }

    if config.payment.bank_code.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "payment.bank_code cannot be empty".to_string(),
        ));
    }

    let session_open = parse_deadline(&config.schedule.session_open)?;
    let acquisition_open = parse_deadline(&config.schedule.acquisition_open)?;
    if session_open >= acquisition_open {
        return Err(ConfigError::ValidationError(format!(
            "schedule.session_open ({}) must be earlier than schedule.acquisition_open ({})",
            config.schedule.session_open, config.schedule.acquisition_open
        )));
    }

    let schedule = &config.schedule;
    if schedule.coarse_poll_ms == 0 || schedule.coarse_poll_ms > MAX_COARSE_POLL_MS {
        return Err(ConfigError::ValidationError(format!(
            "schedule.coarse_poll_ms must be between 1 and {}",
            MAX_COARSE_POLL_MS
        )));
    }
    if schedule.fine_poll_ms == 0 || schedule.fine_poll_ms > MAX_FINE_POLL_MS {
        return Err(ConfigError::ValidationError(format!(
            "schedule.fine_poll_ms must be between 1 and {}",
            MAX_FINE_POLL_MS
        )));
    }

    if config.challenge.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "challenge.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.session.entry_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "session.entry_attempts cannot be 0".to_string(),
        ));
    }

    let timeouts = &config.timeouts;
    let waits = [
        ("entry_ready_secs", timeouts.entry_ready_secs),
        ("post_submit_secs", timeouts.post_submit_secs),
        ("reserve_control_secs", timeouts.reserve_control_secs),
        ("child_surface_secs", timeouts.child_surface_secs),
        ("child_poll_ms", timeouts.child_poll_ms),
        ("challenge_load_secs", timeouts.challenge_load_secs),
        ("allocation_frame_secs", timeouts.allocation_frame_secs),
        ("unit_probe_secs", timeouts.unit_probe_secs),
        ("commit_step_secs", timeouts.commit_step_secs),
    ];
    if let Some((name, _)) = waits.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::ValidationError(format!(
            "timeouts.{} cannot be 0",
            name
        )));
    }

    if let Some(solver) = &config.solver {
        if solver.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "solver.url cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::testing::fixtures::SAMPLE_TOML;

    fn sample() -> Config {
        load_config_from_str(SAMPLE_TOML).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&sample()).is_ok());
    }

    #[test]
    fn test_validate_deadlines_out_of_order() {
        let mut config = sample();
        config.schedule.session_open = "2030-01-01T12:00:00Z".to_string();
        config.schedule.acquisition_open = "2030-01-01T12:00:00Z".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_bad_deadline_format() {
        let mut config = sample();
        config.schedule.acquisition_open = "noon".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeadline { .. }));
    }

    #[test]
    fn test_validate_bad_phone() {
        let mut config = sample();
        config.contact.phone = "0101234".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_missing_password() {
        let mut config = sample();
        config.credentials.password = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = sample();
        config.challenge.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_polling_precision() {
        let mut config = sample();
        config.schedule.fine_poll_ms = 200;
        assert!(validate_config(&config).is_err());

        let mut config = sample();
        config.schedule.coarse_poll_ms = 5000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = sample();
        config.timeouts.commit_step_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("commit_step_secs"));
    }
}
