//! The acquisition state machine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{ArtifactConfig, Config, ConfigError};
use crate::metrics;
use crate::search::{AllocationSearch, Availability, SearchError, SearchReport};
use crate::solver::ChallengeSolver;
use crate::surface::{cancellable, pause, poll_until, script, Selector, Surface, SurfaceError};

use super::challenge::ChallengeLoop;
use super::commit::CommitSequencer;
use super::error::StageFailure;
use super::types::{
    AcquisitionAttempt, AcquisitionReport, AttemptOutcome, AttemptState, FailureTag,
    StateCallback,
};

/// Drives one acquisition attempt from the event page to a submitted order.
///
/// States only move forward:
/// `Init -> AwaitingChildSurface -> SolvingChallenge -> SearchingAllocation ->
/// Committing -> Succeeded`, with `Failed` or `Aborted` reachable from any
/// non-terminal state. The attempt is never retried here.
pub struct AcquisitionMachine {
    event_location: String,
    child_location_hints: Vec<String>,
    notice_close: String,
    date_option: Selector,
    time_option: Selector,
    reserve_button: Selector,
    challenge_image: Selector,
    allocation_frame: Selector,
    reserve_timeout: Duration,
    child_timeout: Duration,
    child_poll: Duration,
    marker_probe: Duration,
    frame_timeout: Duration,
    settle: Duration,
    artifacts: ArtifactConfig,
    challenge: ChallengeLoop,
    search: AllocationSearch,
    commit: CommitSequencer,
    clock: Arc<dyn Clock>,
    callback: Option<StateCallback>,
}

/// Mutable state threaded through one run.
struct RunState {
    attempt: AcquisitionAttempt,
    /// The surface currently being driven, for failure screenshots.
    active: Arc<dyn Surface>,
    /// The child surface, for the confirmation screenshot.
    child: Option<Arc<dyn Surface>>,
    search: Option<SearchReport>,
}

impl AcquisitionMachine {
    pub fn new(
        config: &Config,
        solver: ChallengeSolver,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let selectors = &config.selectors;
        let timeouts = &config.timeouts;

        Ok(Self {
            event_location: config.target.event_location.clone(),
            child_location_hints: config.target.child_location_hints.clone(),
            notice_close: selectors.notice_close.clone(),
            date_option: Selector::from(&selectors.date_option),
            time_option: Selector::from(&selectors.time_option),
            reserve_button: Selector::from(&selectors.reserve_button),
            challenge_image: Selector::from(&selectors.challenge_image),
            allocation_frame: Selector::from(&selectors.allocation_frame),
            reserve_timeout: Duration::from_secs(timeouts.reserve_control_secs),
            child_timeout: Duration::from_secs(timeouts.child_surface_secs),
            child_poll: Duration::from_millis(timeouts.child_poll_ms),
            marker_probe: Duration::from_millis(timeouts.marker_probe_ms),
            frame_timeout: Duration::from_secs(timeouts.allocation_frame_secs),
            settle: Duration::from_secs(timeouts.settle_secs),
            artifacts: config.artifacts.clone(),
            challenge: ChallengeLoop::new(config, solver),
            search: AllocationSearch::new(config),
            commit: CommitSequencer::new(config)?,
            clock,
            callback: None,
        })
    }

    /// Set a callback invoked on every state change.
    pub fn with_callback(mut self, callback: StateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Runs one attempt on the authenticated `parent` surface.
    ///
    /// Always returns a report with a terminal outcome.
    pub async fn run(
        &self,
        parent: Arc<dyn Surface>,
        cancel: &CancellationToken,
    ) -> AcquisitionReport {
        let started = Instant::now();
        let mut run = RunState {
            attempt: AcquisitionAttempt::new(self.clock.now()),
            active: Arc::clone(&parent),
            child: None,
            search: None,
        };
        info!(attempt = %run.attempt.id, "Acquisition attempt started");

        let outcome = match self.drive(&mut run, parent, cancel).await {
            Ok(()) => AttemptOutcome::Succeeded {
                confirmation: self.confirm(&run, cancel).await,
            },
            Err(failure) => failure.into_outcome(),
        };

        if let AttemptOutcome::Failed { tag, class, cause } = &outcome {
            error!(
                attempt = %run.attempt.id,
                state = %run.attempt.state(),
                tag = %tag,
                class = %class,
                "Acquisition attempt failed: {}",
                cause
            );
            if self.artifacts.capture_on_failure {
                self.capture_failure(&run, tag).await;
            }
        }

        run.attempt.finish(outcome.clone(), self.clock.now());
        self.notify(&run.attempt);

        let label = match &outcome {
            AttemptOutcome::Succeeded { .. } => "succeeded".to_string(),
            AttemptOutcome::Failed { tag, .. } => tag.as_tag(),
            AttemptOutcome::Aborted { .. } => "aborted".to_string(),
        };
        metrics::ATTEMPTS.with_label_values(&[&label]).inc();
        metrics::ATTEMPT_DURATION
            .with_label_values(&[outcome.state().as_str()])
            .observe(started.elapsed().as_secs_f64());

        info!(
            attempt = %run.attempt.id,
            outcome = %outcome,
            challenge_attempts = run.attempt.challenge_attempts(),
            challenge_reloads = run.attempt.challenge_reloads(),
            partitions_probed = run.attempt.partitions_probed(),
            "Acquisition attempt finished"
        );

        AcquisitionReport {
            attempt: run.attempt,
            outcome,
            search: run.search,
        }
    }

    async fn drive(
        &self,
        run: &mut RunState,
        parent: Arc<dyn Surface>,
        cancel: &CancellationToken,
    ) -> Result<(), StageFailure> {
        self.init(parent.as_ref(), cancel)
            .await
            .map_err(|e| StageFailure::surface(AttemptState::Init, e))?;

        self.enter(run, AttemptState::AwaitingChildSurface);
        let child = self.await_child(parent.as_ref(), cancel).await?;
        run.active = Arc::clone(&child);
        run.child = Some(Arc::clone(&child));

        self.enter(run, AttemptState::SolvingChallenge);
        self.challenge
            .run(child.as_ref(), &mut run.attempt, cancel)
            .await?;

        self.enter(run, AttemptState::SearchingAllocation);
        let frame = cancellable(
            cancel,
            child.frame(&self.allocation_frame, self.frame_timeout),
        )
        .await
        .map_err(|e| StageFailure::surface(AttemptState::SearchingAllocation, e))?;
        run.active = Arc::clone(&frame);
        self.search_allocation(run, frame.as_ref(), cancel).await?;

        self.enter(run, AttemptState::Committing);
        self.commit.run(frame.as_ref(), cancel).await?;
        Ok(())
    }

    /// Loads the event page and triggers the reservation popup.
    async fn init(
        &self,
        parent: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<(), SurfaceError> {
        cancellable(cancel, parent.navigate(&self.event_location)).await?;

        for selector in [&self.date_option, &self.time_option, &self.reserve_button] {
            self.dismiss_notice(parent, cancel).await?;
            let control = cancellable(
                cancel,
                parent.wait_for_control(selector, self.reserve_timeout),
            )
            .await?;
            cancellable(cancel, parent.click(&control)).await?;
            debug!(control = %selector, "Clicked");
        }
        Ok(())
    }

    /// Closes the notice dialog if it is showing. Only cancellation is an error.
    async fn dismiss_notice(
        &self,
        parent: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<(), SurfaceError> {
        let dismiss = script::dismiss_notice(&self.notice_close);
        match cancellable(cancel, parent.evaluate(&dismiss)).await {
            Ok(value) => {
                if value.as_bool() == Some(true) {
                    debug!("Dismissed notice dialog");
                }
                Ok(())
            }
            Err(SurfaceError::Cancelled) => Err(SurfaceError::Cancelled),
            Err(e) => {
                debug!("Notice dialog check failed: {}", e);
                Ok(())
            }
        }
    }

    /// Polls for the child surface the reserve action opens.
    async fn await_child(
        &self,
        parent: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn Surface>, StageFailure> {
        let found = poll_until(
            "child surface",
            self.child_timeout,
            self.child_poll,
            cancel,
            move || async move {
                let children = parent.open_child_surfaces().await?;
                for child in children.into_iter().rev() {
                    if self.is_target(child.as_ref(), cancel).await? {
                        return Ok(Some(child));
                    }
                }
                Ok(None)
            },
        )
        .await;

        match found {
            Ok(child) => {
                info!(surface = child.id(), "Child surface acquired");
                Ok(child)
            }
            Err(SurfaceError::Timeout { after, .. }) => Err(StageFailure::failed(
                FailureTag::NoChildSurface,
                format!("no child surface appeared within {:?}", after),
            )),
            Err(e) => Err(StageFailure::surface(AttemptState::AwaitingChildSurface, e)),
        }
    }

    /// Whether `candidate` is the reservation surface: it shows the challenge or
    /// the allocation frame, or, failing that, its location carries a hint.
    async fn is_target(
        &self,
        candidate: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<bool, SurfaceError> {
        for marker in [&self.challenge_image, &self.allocation_frame] {
            let probe = candidate.wait_for_control(marker, self.marker_probe);
            match cancellable(cancel, probe).await {
                Ok(_) => return Ok(true),
                Err(SurfaceError::Timeout { .. }) | Err(SurfaceError::NotFound(_)) => {}
                Err(SurfaceError::Closed) => return Ok(false),
                Err(e) => return Err(e),
            }
        }

        let location = match cancellable(cancel, candidate.current_location()).await {
            Ok(location) => location,
            Err(SurfaceError::Closed) => return Ok(false),
            Err(e) => return Err(e),
        };
        let hinted = self
            .child_location_hints
            .iter()
            .any(|hint| location.contains(hint.as_str()));
        if hinted {
            debug!(location = %location, "Child surface matched by location");
        }
        Ok(hinted)
    }

    async fn search_allocation(
        &self,
        run: &mut RunState,
        frame: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<(), StageFailure> {
        let report = match self.search.find_and_hold(frame, cancel).await {
            Ok(report) => report,
            Err(SearchError::NoPartitions) => {
                return Err(StageFailure::failed(
                    FailureTag::NoPartitions,
                    "the allocation exposed no interactive partitions",
                ))
            }
            Err(SearchError::Cancelled) => return Err(StageFailure::Cancelled),
            Err(SearchError::Surface(e)) => {
                return Err(StageFailure::surface(AttemptState::SearchingAllocation, e))
            }
        };

        let probed = report
            .visited
            .iter()
            .filter(|p| p.availability != Availability::Unknown)
            .count() as u32;
        run.attempt.record_partitions_probed(probed);

        let held = report.held;
        let visited = report.visited.len();
        run.search = Some(report);

        if held {
            Ok(())
        } else {
            Err(StageFailure::failed(
                FailureTag::SoldOut,
                format!("all {} partitions were empty", visited),
            ))
        }
    }

    /// Waits out the settle period and screenshots the confirmation.
    async fn confirm(&self, run: &RunState, cancel: &CancellationToken) -> Option<PathBuf> {
        // The target exposes no completion signal after the final submit.
        if pause(cancel, self.settle).await.is_err() {
            warn!("Cancelled while settling after submit, skipping confirmation screenshot");
            return None;
        }

        let surface = run.child.as_ref().unwrap_or(&run.active);
        let path = self
            .artifacts
            .dir
            .join(format!("confirmation-{}.png", run.attempt.id));
        self.screenshot(surface.as_ref(), &path).await.then_some(path)
    }

    async fn capture_failure(&self, run: &RunState, tag: &FailureTag) {
        let name = format!(
            "failure-{}-{}.png",
            run.attempt.id,
            tag.as_tag().replace(':', "-")
        );
        let path = self.artifacts.dir.join(name);
        self.screenshot(run.active.as_ref(), &path).await;
    }

    async fn screenshot(&self, surface: &dyn Surface, path: &std::path::Path) -> bool {
        if let Some(dir) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!("Failed to create artifact directory {}: {}", dir.display(), e);
                return false;
            }
        }
        match surface.screenshot(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Screenshot saved");
                true
            }
            Err(e) => {
                warn!("Failed to save screenshot {}: {}", path.display(), e);
                false
            }
        }
    }

    fn enter(&self, run: &mut RunState, state: AttemptState) {
        let from = run.attempt.state();
        if run.attempt.advance(state, self.clock.now()) {
            info!(attempt = %run.attempt.id, from = %from, to = %state, "State transition");
            self.notify(&run.attempt);
        }
    }

    fn notify(&self, attempt: &AcquisitionAttempt) {
        if let Some(callback) = &self.callback {
            callback(&attempt.id.to_string(), attempt.state());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::testing::{fixtures, MockSolver, MockVenue};
    use tempfile::TempDir;

    fn machine(solver: Arc<MockSolver>, artifacts: &TempDir) -> AcquisitionMachine {
        let mut config = fixtures::config();
        config.artifacts.dir = artifacts.path().to_path_buf();
        config.artifacts.capture_on_failure = true;
        AcquisitionMachine::new(&config, ChallengeSolver::new(solver), Arc::new(SystemClock))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_popup_fails_and_captures_parent() {
        let artifacts = TempDir::new().unwrap();
        let venue = MockVenue::builder()
            .partition("a", 0.0, 100.0, 1)
            .without_login()
            .without_popup()
            .build();
        let solver = Arc::new(MockSolver::with_answers(vec!["abcd"]));

        let report = machine(solver.clone(), &artifacts)
            .run(venue.parent.clone(), &CancellationToken::new())
            .await;

        assert_eq!(report.outcome.label(), "failed:no-child-surface");
        assert_eq!(report.attempt.state(), AttemptState::Failed);
        assert_eq!(solver.call_count().await, 0);
        let captured = venue.parent.screenshots();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].starts_with(artifacts.path()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_challenge_goes_straight_to_search() {
        let artifacts = TempDir::new().unwrap();
        let venue = MockVenue::builder()
            .partition("a", 0.0, 100.0, 1)
            .without_login()
            .without_challenge()
            .build();
        let solver = Arc::new(MockSolver::with_answers(vec!["abcd"]));

        let report = machine(solver.clone(), &artifacts)
            .run(venue.parent.clone(), &CancellationToken::new())
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(report.attempt.challenge_attempts(), 0);
        assert_eq!(solver.call_count().await, 0);
        assert_eq!(report.search.map(|s| s.held), Some(true));
        assert_eq!(
            venue.parent.clicks(),
            vec!["#dates li:first-child", "#times li:first-child", "#reserve"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_aborts() {
        let artifacts = TempDir::new().unwrap();
        let venue = MockVenue::builder().without_login().build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = machine(Arc::new(MockSolver::new()), &artifacts)
            .run(venue.parent.clone(), &cancel)
            .await;

        assert_eq!(report.outcome.label(), "aborted:cancelled");
        assert_eq!(report.attempt.state(), AttemptState::Aborted);
        assert!(venue.parent.navigations().is_empty());
        assert!(venue.parent.screenshots().is_empty());
    }
}
