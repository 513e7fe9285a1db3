//! Mock surface launcher for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::surface::{Surface, SurfaceError, SurfaceLauncher};

/// Mock implementation of the SurfaceLauncher trait.
///
/// Hands out the same surface on every launch and counts launches and
/// shutdowns.
pub struct MockLauncher {
    surface: Arc<dyn Surface>,
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    fail_launch: bool,
}

impl MockLauncher {
    pub fn new(surface: Arc<dyn Surface>) -> Self {
        Self {
            surface,
            launches: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            fail_launch: false,
        }
    }

    /// A launcher whose launch always fails.
    pub fn failing(surface: Arc<dyn Surface>) -> Self {
        Self {
            fail_launch: true,
            ..Self::new(surface)
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceLauncher for MockLauncher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(&self) -> Result<Arc<dyn Surface>, SurfaceError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(SurfaceError::Other("browser failed to start".to_string()));
        }
        Ok(Arc::clone(&self.surface))
    }

    async fn shutdown(&self) -> Result<(), SurfaceError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.surface.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launcher_counts() {
        let surface: Arc<dyn Surface> = Arc::new(crate::testing::MockSurface::new("s"));
        let launcher = MockLauncher::new(surface);
        let launched = launcher.launch().await.unwrap();
        assert_eq!(launched.id(), "s");
        launcher.shutdown().await.unwrap();
        assert_eq!(launcher.launch_count(), 1);
        assert_eq!(launcher.shutdown_count(), 1);

        let failing = MockLauncher::failing(launched);
        assert!(failing.launch().await.is_err());
    }
}
