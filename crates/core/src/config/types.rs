use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub contact: ContactConfig,
    pub payment: PaymentConfig,
    pub schedule: ScheduleConfig,
    pub target: TargetConfig,
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub challenge: ChallengeConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub solver: Option<SolverConfig>,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

/// Account credentials submitted at the entry point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

/// Contact details entered during checkout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactConfig {
    /// Phone number in `AAA-BBBB-CCCC` form (exactly three dash-separated parts).
    pub phone: String,
}

impl ContactConfig {
    /// Splits the phone number into its three fields.
    ///
    /// Returns `None` unless there are exactly three non-empty numeric parts.
    pub fn phone_parts(&self) -> Option<[String; 3]> {
        let parts: Vec<&str> = self.phone.trim().split('-').collect();
        if parts.len() != 3 {
            return None;
        }
        if parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
        {
            return None;
        }
        Some([
            parts[0].to_string(),
            parts[1].to_string(),
            parts[2].to_string(),
        ])
    }
}

/// Payment choices for the commit sequence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    /// Option value of the banking institution in the bank select control.
    pub bank_code: String,
}

/// The two wall-clock deadlines and scheduler polling rates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// When to establish the session. RFC 3339, or `YYYY-MM-DD HH:MM:SS` in local time.
    pub session_open: String,
    /// When the allocation opens for purchase. Same formats as `session_open`.
    pub acquisition_open: String,
    /// Poll interval while far from a deadline (milliseconds).
    #[serde(default = "default_coarse_poll_ms")]
    pub coarse_poll_ms: u64,
    /// Poll interval inside the fine window (milliseconds).
    #[serde(default = "default_fine_poll_ms")]
    pub fine_poll_ms: u64,
    /// How long before a deadline fine polling starts (seconds).
    #[serde(default = "default_fine_window_secs")]
    pub fine_window_secs: u64,
    /// How long a cancelled phase gets to wind down before it is aborted (milliseconds).
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

fn default_coarse_poll_ms() -> u64 {
    1000
}

fn default_fine_poll_ms() -> u64 {
    50
}

fn default_fine_window_secs() -> u64 {
    5
}

fn default_cancel_grace_ms() -> u64 {
    2000
}

/// Locations on the target surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// The event page; also the reference location for session probing.
    pub event_location: String,
    /// The credential entry point.
    pub entry_location: String,
    /// Substring of a location that means "still at the entry point".
    #[serde(default = "default_entry_marker")]
    pub entry_marker: String,
    /// Location keywords that identify the child surface when no marker shows.
    #[serde(default = "default_child_location_hints")]
    pub child_location_hints: Vec<String>,
}

fn default_entry_marker() -> String {
    "login".to_string()
}

fn default_child_location_hints() -> Vec<String> {
    vec![
        "onestop".to_string(),
        "popup".to_string(),
        "reservation".to_string(),
    ]
}

/// Selectors for every control the workflow touches.
///
/// These are part of the contract with the target site and have no defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectorConfig {
    pub login_username: String,
    pub login_password: String,
    pub login_submit: String,
    pub notice_close: String,
    pub date_option: String,
    pub time_option: String,
    pub reserve_button: String,
    pub challenge_image: String,
    pub challenge_input: String,
    pub challenge_submit: String,
    pub challenge_reload: String,
    /// Panel that is hidden once the challenge has been passed.
    pub challenge_panel: String,
    pub allocation_frame: String,
    /// Partition shapes inside the allocation frame.
    pub partition_shapes: String,
    /// Container whose viewBox defines the partition space.
    pub partition_canvas: String,
    /// Unit shapes shown after a partition is selected.
    pub unit_shapes: String,
    /// Container of the unit view; its presence means units have loaded.
    pub unit_canvas: String,
    /// Fill colours of units that cannot be taken.
    #[serde(default = "default_unavailable_fills")]
    pub unavailable_fills: Vec<String>,
    /// Control that returns to the partition view.
    pub back_to_partitions: String,
    pub confirm_selection: String,
    pub advance_to_payment: String,
    pub phone_fields: [String; 3],
    pub payment_method: String,
    pub receipt_option: String,
    pub bank_select: String,
    pub consent_all: String,
    pub final_submit: String,
}

fn default_unavailable_fills() -> Vec<String> {
    vec!["#DDDDDD".to_string(), "none".to_string()]
}

/// Browser launch options.
///
/// Read by [`SurfaceLauncher`](crate::surface::SurfaceLauncher) implementations
/// when they start the driver; the core only reports them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
        }
    }
}

fn default_headless() -> bool {
    true
}

/// Challenge retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChallengeConfig {
    /// Solve attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// How long to wait for the success signal after submitting (milliseconds).
    #[serde(default = "default_success_probe_ms")]
    pub success_probe_ms: u64,
    /// How long to wait for a fresh image after a reload (milliseconds).
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            success_probe_ms: default_success_probe_ms(),
            refresh_timeout_ms: default_refresh_timeout_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_success_probe_ms() -> u64 {
    1000
}

fn default_refresh_timeout_ms() -> u64 {
    3000
}

/// Per-stage bounded waits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_entry_ready_secs")]
    pub entry_ready_secs: u64,
    #[serde(default = "default_post_submit_secs")]
    pub post_submit_secs: u64,
    #[serde(default = "default_reserve_control_secs")]
    pub reserve_control_secs: u64,
    #[serde(default = "default_child_surface_secs")]
    pub child_surface_secs: u64,
    #[serde(default = "default_child_poll_ms")]
    pub child_poll_ms: u64,
    #[serde(default = "default_marker_probe_ms")]
    pub marker_probe_ms: u64,
    #[serde(default = "default_challenge_load_secs")]
    pub challenge_load_secs: u64,
    #[serde(default = "default_allocation_frame_secs")]
    pub allocation_frame_secs: u64,
    #[serde(default = "default_unit_probe_secs")]
    pub unit_probe_secs: u64,
    #[serde(default = "default_commit_step_secs")]
    pub commit_step_secs: u64,
    /// Fixed wait after the final submit; the target exposes no completion signal.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            entry_ready_secs: default_entry_ready_secs(),
            post_submit_secs: default_post_submit_secs(),
            reserve_control_secs: default_reserve_control_secs(),
            child_surface_secs: default_child_surface_secs(),
            child_poll_ms: default_child_poll_ms(),
            marker_probe_ms: default_marker_probe_ms(),
            challenge_load_secs: default_challenge_load_secs(),
            allocation_frame_secs: default_allocation_frame_secs(),
            unit_probe_secs: default_unit_probe_secs(),
            commit_step_secs: default_commit_step_secs(),
            settle_secs: default_settle_secs(),
        }
    }
}

fn default_entry_ready_secs() -> u64 {
    15
}

fn default_post_submit_secs() -> u64 {
    10
}

fn default_reserve_control_secs() -> u64 {
    5
}

fn default_child_surface_secs() -> u64 {
    10
}

fn default_child_poll_ms() -> u64 {
    1000
}

fn default_marker_probe_ms() -> u64 {
    1000
}

fn default_challenge_load_secs() -> u64 {
    10
}

fn default_allocation_frame_secs() -> u64 {
    30
}

fn default_unit_probe_secs() -> u64 {
    5
}

fn default_commit_step_secs() -> u64 {
    10
}

fn default_settle_secs() -> u64 {
    5
}

/// Session persistence and entry-point retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Attempts at loading the entry point when it is slow to become ready.
    #[serde(default = "default_entry_attempts")]
    pub entry_attempts: u32,
    /// Back-off between entry attempts, multiplied by the attempt number (seconds).
    #[serde(default = "default_entry_backoff_secs")]
    pub entry_backoff_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            entry_attempts: default_entry_attempts(),
            entry_backoff_secs: default_entry_backoff_secs(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_entry_attempts() -> u32 {
    3
}

fn default_entry_backoff_secs() -> u64 {
    30
}

/// Remote OCR service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
    /// Endpoint accepting `{"image": "<base64 png>"}` and answering `{"text": "..."}`.
    pub url: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_solver_timeout")]
    pub timeout_secs: u64,
}

fn default_solver_timeout() -> u64 {
    10
}

/// Where confirmation and debug screenshots go.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,
    /// Capture a screenshot of the active surface when an attempt fails.
    #[serde(default)]
    pub capture_on_failure: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            capture_on_failure: false,
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub credentials: SanitizedCredentialsConfig,
    pub phone_configured: bool,
    pub schedule: ScheduleConfig,
    pub target: TargetConfig,
    pub browser: BrowserConfig,
    pub challenge: ChallengeConfig,
    pub timeouts: TimeoutConfig,
    pub session: SessionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
    pub artifacts: ArtifactConfig,
}

/// Credentials with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCredentialsConfig {
    pub username: String,
    pub password_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            credentials: SanitizedCredentialsConfig {
                username: config.credentials.username.clone(),
                password_configured: !config.credentials.password.is_empty(),
            },
            phone_configured: !config.contact.phone.is_empty(),
            schedule: config.schedule.clone(),
            target: config.target.clone(),
            browser: config.browser.clone(),
            challenge: config.challenge.clone(),
            timeouts: config.timeouts.clone(),
            session: config.session.clone(),
            solver: config.solver.clone(),
            artifacts: config.artifacts.clone(),
        }
    }
}
