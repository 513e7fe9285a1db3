//! Trait definitions for the surface module.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::session::SessionToken;

use super::error::SurfaceError;
use super::types::{Control, Script, Selector};

/// An interactive application instance (a page, a popup window, or an
/// embedded frame addressed as its own surface).
///
/// All calls on one surface are issued sequentially by a single task.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Stable identifier of this surface, used in logs and to compare surfaces.
    fn id(&self) -> &str;

    /// Navigates to a location and waits for the driver's load signal.
    async fn navigate(&self, location: &str) -> Result<(), SurfaceError>;

    /// The current location.
    async fn current_location(&self) -> Result<String, SurfaceError>;

    /// Waits until a control matching `selector` is present, up to `timeout`.
    async fn wait_for_control(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Control, SurfaceError>;

    /// Clicks a control.
    async fn click(&self, control: &Control) -> Result<(), SurfaceError>;

    /// Types text into a control.
    async fn type_text(&self, control: &Control, text: &str) -> Result<(), SurfaceError>;

    /// Evaluates a script and returns its JSON result.
    async fn evaluate(&self, script: &Script) -> Result<serde_json::Value, SurfaceError>;

    /// Surfaces (popups) opened by this surface.
    async fn open_child_surfaces(&self) -> Result<Vec<Arc<dyn Surface>>, SurfaceError>;

    /// The embedded frame matching `selector`, waiting up to `timeout` for it to appear.
    async fn frame(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Arc<dyn Surface>, SurfaceError>;

    /// Writes a screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), SurfaceError>;

    /// Exports the credential material (cookies) currently held by the surface.
    async fn export_session(&self) -> Result<SessionToken, SurfaceError>;

    /// Applies previously exported credential material.
    async fn apply_session(&self, token: &SessionToken) -> Result<(), SurfaceError>;

    /// Closes the surface.
    async fn close(&self) -> Result<(), SurfaceError>;
}

/// Creates surfaces and owns the process behind them.
#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    /// Name of this launcher implementation.
    fn name(&self) -> &str;

    /// Launches (or reuses) the driver and opens a fresh top-level surface.
    async fn launch(&self) -> Result<Arc<dyn Surface>, SurfaceError>;

    /// Closes every surface and stops the driver.
    async fn shutdown(&self) -> Result<(), SurfaceError>;
}
