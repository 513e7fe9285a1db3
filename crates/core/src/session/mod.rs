//! Session module: producing an authenticated surface.
//!
//! A persisted token is tried first by applying it and checking whether the
//! event location is reachable without a detour through the entry point.
//! Otherwise credentials are submitted interactively and the resulting token
//! is persisted for the next run.

mod error;
mod file_store;
mod manager;
mod traits;
mod types;

pub use error::{SessionError, StoreError};
pub use file_store::FileSessionStore;
pub use manager::SessionManager;
pub use traits::SessionStore;
pub use types::{EstablishedSession, SessionToken, TokenValidity};
