//! Scheduler configuration.

use std::time::Duration;

use crate::config::ScheduleConfig;

/// Polling tiers and cancellation grace for the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Poll interval while far from the next deadline.
    pub coarse_poll: Duration,
    /// Poll interval inside the fine window.
    pub fine_poll: Duration,
    /// How close to a deadline fine polling starts.
    pub fine_window: Duration,
    /// How long running phases get to wind down after cancellation.
    pub cancel_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            coarse_poll: Duration::from_millis(1000),
            fine_poll: Duration::from_millis(50),
            fine_window: Duration::from_secs(5),
            cancel_grace: Duration::from_millis(2000),
        }
    }
}

impl From<&ScheduleConfig> for SchedulerConfig {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            coarse_poll: Duration::from_millis(config.coarse_poll_ms),
            fine_poll: Duration::from_millis(config.fine_poll_ms),
            fine_window: Duration::from_secs(config.fine_window_secs),
            cancel_grace: Duration::from_millis(config.cancel_grace_ms),
        }
    }
}

impl SchedulerConfig {
    /// How long to sleep when the next deadline is `remaining` away.
    ///
    /// Never longer than `remaining`, so a sleep cannot overshoot the deadline.
    pub fn poll_interval(&self, remaining: Duration) -> Duration {
        let tier = if remaining > self.fine_window {
            self.coarse_poll
        } else {
            self.fine_poll
        };
        tier.min(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::testing::fixtures::SAMPLE_TOML;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.coarse_poll, Duration::from_secs(1));
        assert_eq!(config.fine_poll, Duration::from_millis(50));
        assert_eq!(config.fine_window, Duration::from_secs(5));
        assert_eq!(config.cancel_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_from_schedule_config() {
        let toml = SAMPLE_TOML.replace(
            "acquisition_open = \"2030-01-01T12:00:00Z\"",
            "acquisition_open = \"2030-01-01T12:00:00Z\"\nfine_poll_ms = 20\nfine_window_secs = 2",
        );
        let config = load_config_from_str(&toml).unwrap();
        let scheduler = SchedulerConfig::from(&config.schedule);
        assert_eq!(scheduler.fine_poll, Duration::from_millis(20));
        assert_eq!(scheduler.fine_window, Duration::from_secs(2));
        assert_eq!(scheduler.coarse_poll, Duration::from_secs(1));
    }

    #[test]
    fn test_poll_interval_tiers() {
        let config = SchedulerConfig::default();
        assert_eq!(
            config.poll_interval(Duration::from_secs(60)),
            Duration::from_secs(1)
        );
        assert_eq!(
            config.poll_interval(Duration::from_secs(3)),
            Duration::from_millis(50)
        );
        assert_eq!(
            config.poll_interval(Duration::from_millis(20)),
            Duration::from_millis(20)
        );
        assert_eq!(config.poll_interval(Duration::ZERO), Duration::ZERO);
    }
}
