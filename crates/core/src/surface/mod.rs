//! Surface module: the contract with the interactive application being driven.
//!
//! The workflow only ever talks to a [`Surface`] through these primitives:
//! navigation, location, bounded control lookup, click/type, script
//! evaluation, child surfaces, frames, screenshots and session material.
//! No rendering engine is assumed.
//!
//! # Example
//!
//! ```ignore
//! use curtaincall_core::surface::{poll_until, Selector, Surface};
//!
//! let reserve = surface
//!     .wait_for_control(&Selector::new("#reserve"), Duration::from_secs(5))
//!     .await?;
//! surface.click(&reserve).await?;
//! ```

mod error;
pub mod script;
mod traits;
mod types;
mod wait;

pub use error::SurfaceError;
pub use traits::{Surface, SurfaceLauncher};
pub use types::{Control, Script, ScriptKind, Selector};
pub use wait::{cancellable, pause, poll_until};
