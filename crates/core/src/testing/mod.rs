//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of every seam the orchestrator
//! talks through (surfaces, launcher, solver, session store, clock), so a full
//! scheduled run can be exercised without a browser or a recognition service.
//!
//! # Example
//!
//! ```rust,ignore
//! use curtaincall_core::testing::{fixtures, MockLauncher, MockSolver, MockVenue};
//!
//! let venue = MockVenue::builder().partition("a", 0.0, 100.0, 1).build();
//! let launcher = MockLauncher::new(venue.parent.clone());
//! let solver = MockSolver::with_answers(vec!["ABCD"]);
//!
//! // Hand them to an AcquisitionService built from fixtures::config()...
//! ```

mod mock_clock;
mod mock_launcher;
mod mock_session_store;
mod mock_solver;
mod mock_surface;
mod mock_venue;

pub use mock_clock::MockClock;
pub use mock_launcher::MockLauncher;
pub use mock_session_store::MockSessionStore;
pub use mock_solver::MockSolver;
pub use mock_surface::{MockPage, MockSurface};
pub use mock_venue::{MockVenue, MockVenueBuilder, POPUP_LOCATION};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use crate::config::{load_config_from_str, Config};
    use crate::session::SessionToken;
    use crate::surface::ScriptKind;

    use super::MockSurface;

    pub const EVENT_LOCATION: &str = "https://tickets.example/event/42";
    pub const ENTRY_LOCATION: &str = "https://accounts.example/login";

    /// Cookie jar the mock entry point hands out for the right credentials.
    pub const VALID_SESSION: &[u8] = b"sid=alice-session";

    /// Selectors used by [`SAMPLE_TOML`].
    pub mod selectors {
        pub const LOGIN_USERNAME: &str = "#username";
        pub const LOGIN_PASSWORD: &str = "#password";
        pub const LOGIN_SUBMIT: &str = "#login-submit";
        pub const DATE_OPTION: &str = "#dates li:first-child";
        pub const TIME_OPTION: &str = "#times li:first-child";
        pub const RESERVE: &str = "#reserve";
        pub const CHALLENGE_IMAGE: &str = "#challenge-image";
        pub const CHALLENGE_INPUT: &str = "#challenge-input";
        pub const CHALLENGE_SUBMIT: &str = "#challenge-submit";
        pub const CHALLENGE_RELOAD: &str = "#challenge-reload";
        pub const CHALLENGE_PANEL: &str = "#challenge-panel";
        pub const ALLOCATION_FRAME: &str = "#allocation-frame";
        pub const UNIT_CANVAS: &str = "#units svg";
        pub const BACK_TO_PARTITIONS: &str = "#back-to-zones";
        pub const CONFIRM_SELECTION: &str = "#confirm-selection";
        pub const ADVANCE_TO_PAYMENT: &str = "#next-payment";
        pub const PHONE_FIELDS: [&str; 3] = ["#tel1", "#tel2", "#tel3"];
        pub const PAYMENT_METHOD: &str = "#pay-transfer";
        pub const RECEIPT_OPTION: &str = "#receipt-none";
        pub const BANK_SELECT: &str = "select[name=bank]";
        pub const CONSENT_ALL: &str = "#agree-all";
        pub const FINAL_SUBMIT: &str = "#final-submit";
    }

    /// A complete configuration: deadlines in 2030, every selector set.
    pub const SAMPLE_TOML: &str = r##"
[credentials]
username = "alice"
password = "hunter2"

[contact]
phone = "010-1234-5678"

[payment]
bank_code = "88"

[schedule]
session_open = "2030-01-01T11:55:00Z"
acquisition_open = "2030-01-01T12:00:00Z"

[target]
event_location = "https://tickets.example/event/42"
entry_location = "https://accounts.example/login"

[selectors]
login_username = "#username"
login_password = "#password"
login_submit = "#login-submit"
notice_close = "#notice-close"
date_option = "#dates li:first-child"
time_option = "#times li:first-child"
reserve_button = "#reserve"
challenge_image = "#challenge-image"
challenge_input = "#challenge-input"
challenge_submit = "#challenge-submit"
challenge_reload = "#challenge-reload"
challenge_panel = "#challenge-panel"
allocation_frame = "#allocation-frame"
partition_shapes = "#zones svg rect"
partition_canvas = "#zones svg"
unit_shapes = "#units svg rect"
unit_canvas = "#units svg"
back_to_partitions = "#back-to-zones"
confirm_selection = "#confirm-selection"
advance_to_payment = "#next-payment"
phone_fields = ["#tel1", "#tel2", "#tel3"]
payment_method = "#pay-transfer"
receipt_option = "#receipt-none"
bank_select = "select[name=bank]"
consent_all = "#agree-all"
final_submit = "#final-submit"
"##;

    /// Parse [`SAMPLE_TOML`].
    pub fn config() -> Config {
        load_config_from_str(SAMPLE_TOML).expect("sample config should parse")
    }

    /// A persisted token the mock entry point accepts.
    pub fn valid_token() -> SessionToken {
        SessionToken::new(VALID_SESSION)
    }

    /// Wire the credential entry point onto `surface`.
    ///
    /// Navigating to `event` without [`VALID_SESSION`] lands on `entry`.
    /// Submitting "alice"/"hunter2" sets the session and moves to `event`;
    /// any other credentials leave the surface at the entry point.
    pub fn wire_login(surface: &MockSurface, event: &str, entry: &str) {
        surface.add_control(selectors::LOGIN_USERNAME);
        surface.add_control(selectors::LOGIN_PASSWORD);
        surface.add_control(selectors::LOGIN_SUBMIT);

        let (guarded, redirect) = (event.to_string(), entry.to_string());
        surface.on_navigate(move |location, page| {
            page.location = if location == guarded && page.session != VALID_SESSION {
                redirect.clone()
            } else {
                location.to_string()
            };
        });

        let landing = event.to_string();
        surface.on_click(selectors::LOGIN_SUBMIT, move |page| {
            let accepted = page.last_typed(selectors::LOGIN_USERNAME) == Some("alice")
                && page.last_typed(selectors::LOGIN_PASSWORD) == Some("hunter2");
            if accepted {
                page.session = VALID_SESSION.to_vec();
                page.location = landing.clone();
            }
        });
    }

    /// Add every commit control to `surface`. The bank select only offers `bank_option`.
    pub fn wire_commit(surface: &MockSurface, bank_option: &str) {
        for selector in [
            selectors::CONFIRM_SELECTION,
            selectors::ADVANCE_TO_PAYMENT,
            selectors::PAYMENT_METHOD,
            selectors::RECEIPT_OPTION,
            selectors::BANK_SELECT,
            selectors::CONSENT_ALL,
            selectors::FINAL_SUBMIT,
        ] {
            surface.add_control(selector);
        }
        for field in selectors::PHONE_FIELDS {
            surface.add_control(field);
        }

        let offered = bank_option.to_string();
        surface.on_script(ScriptKind::SelectOption, move |script, _| {
            serde_json::json!(script.arg_str("value") == Some(offered.as_str()))
        });
    }

    /// A small PNG with a transparent background whose glyph pixels depend on `n`.
    pub fn challenge_png(n: u32) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(24, 8, Rgba([0, 0, 0, 0]));
        for i in 0..6 {
            let x = (n.wrapping_mul(7) + i * 3) % 24;
            let y = (n + i) % 8;
            img.put_pixel(x, y, Rgba([20, 20, 20, 255]));
        }
        img.put_pixel(n % 24, 0, Rgba([(n % 256) as u8, 0, 0, 255]));

        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .expect("encoding an in-memory PNG should not fail");
        out
    }
}
