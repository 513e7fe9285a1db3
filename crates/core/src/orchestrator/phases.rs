//! Scheduler phase handler that wires the session manager and the attempt machine.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::attempt::{AcquisitionMachine, AcquisitionReport};
use crate::metrics;
use crate::scheduler::PhaseHandler;
use crate::session::{EstablishedSession, SessionError, SessionManager};
use crate::surface::{cancellable, SurfaceLauncher};

pub(crate) struct AcquisitionPhases {
    pub launcher: Arc<dyn SurfaceLauncher>,
    pub sessions: SessionManager,
    pub machine: AcquisitionMachine,
    pub headless: bool,
}

impl AcquisitionPhases {
    async fn establish(
        &self,
        cancel: &CancellationToken,
    ) -> Result<EstablishedSession, SessionError> {
        let surface = cancellable(cancel, self.launcher.launch()).await?;
        info!(
            launcher = self.launcher.name(),
            surface = surface.id(),
            headless = self.headless,
            "Surface launched"
        );

        let persisted = self.sessions.load_persisted().await;
        self.sessions.establish(surface, persisted, cancel).await
    }
}

#[async_trait]
impl PhaseHandler for AcquisitionPhases {
    type Session = EstablishedSession;
    type Output = AcquisitionReport;
    type Error = SessionError;

    async fn on_session(
        &self,
        cancel: CancellationToken,
    ) -> Result<EstablishedSession, SessionError> {
        let established = self.establish(&cancel).await;

        let result = match &established {
            Ok(session) if session.reused => "reused",
            Ok(_) => "login",
            Err(_) => "failed",
        };
        metrics::SESSIONS.with_label_values(&[result]).inc();
        established
    }

    async fn on_acquisition(
        &self,
        session: EstablishedSession,
        cancel: CancellationToken,
    ) -> AcquisitionReport {
        self.machine.run(session.surface, &cancel).await
    }

    async fn release(&self) {
        match self.launcher.shutdown().await {
            Ok(()) => info!(launcher = self.launcher.name(), "Surface launcher shut down"),
            Err(e) => warn!("Failed to shut down surface launcher: {}", e),
        }
    }
}
