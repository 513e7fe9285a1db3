//! Bounded challenge solving on the child surface.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::metrics;
use crate::solver::{decode_data_url, ChallengeArtifact, ChallengeSolver};
use crate::surface::{cancellable, poll_until, script, Selector, Surface, SurfaceError};

use super::error::StageFailure;
use super::types::{AcquisitionAttempt, AttemptState, FailureClass, FailureTag};

const IMAGE_POLL: Duration = Duration::from_millis(100);
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// What the child surface showed when solving started.
enum Presented {
    Challenge(Vec<u8>),
    /// No challenge image, but the allocation frame is already there.
    Skipped,
}

/// Fetch, solve, submit, check, and reload on rejection, up to `max_attempts` times.
pub(crate) struct ChallengeLoop {
    solver: ChallengeSolver,
    image: String,
    input: Selector,
    submit: Selector,
    reload: Selector,
    panel: String,
    allocation_frame: Selector,
    max_attempts: u32,
    success_probe: Duration,
    refresh_timeout: Duration,
    load_timeout: Duration,
}

impl ChallengeLoop {
    pub fn new(config: &Config, solver: ChallengeSolver) -> Self {
        let selectors = &config.selectors;
        Self {
            solver,
            image: selectors.challenge_image.clone(),
            input: Selector::from(&selectors.challenge_input),
            submit: Selector::from(&selectors.challenge_submit),
            reload: Selector::from(&selectors.challenge_reload),
            panel: selectors.challenge_panel.clone(),
            allocation_frame: Selector::from(&selectors.allocation_frame),
            max_attempts: config.challenge.max_attempts.max(1),
            success_probe: Duration::from_millis(config.challenge.success_probe_ms),
            refresh_timeout: Duration::from_millis(config.challenge.refresh_timeout_ms),
            load_timeout: Duration::from_secs(config.timeouts.challenge_load_secs),
        }
    }

    pub async fn run(
        &self,
        surface: &dyn Surface,
        attempt: &mut AcquisitionAttempt,
        cancel: &CancellationToken,
    ) -> Result<(), StageFailure> {
        let stage = |e| StageFailure::surface(AttemptState::SolvingChallenge, e);

        let mut artifact = match self.first_image(surface, cancel).await.map_err(stage)? {
            Presented::Challenge(image) => ChallengeArtifact::new(image),
            Presented::Skipped => {
                info!("No challenge presented, allocation frame already loaded");
                return Ok(());
            }
        };

        for n in 1..=self.max_attempts {
            attempt.record_challenge_attempt();

            if self
                .try_once(surface, &mut artifact, cancel)
                .await
                .map_err(stage)?
            {
                metrics::CHALLENGE_ATTEMPTS.with_label_values(&["passed"]).inc();
                info!(attempt = n, "Challenge passed");
                return Ok(());
            }

            if n == self.max_attempts {
                break;
            }

            artifact = self.reload(surface, &artifact, cancel).await.map_err(stage)?;
            attempt.record_challenge_reload();
        }

        warn!(attempts = self.max_attempts, "Challenge attempts exhausted");
        Err(StageFailure::Failed {
            tag: FailureTag::ChallengeExhausted,
            class: FailureClass::Environment,
            cause: format!("challenge rejected {} times", self.max_attempts),
        })
    }

    /// One solve-and-submit cycle. Returns whether the surface accepted the answer.
    async fn try_once(
        &self,
        surface: &dyn Surface,
        artifact: &mut ChallengeArtifact,
        cancel: &CancellationToken,
    ) -> Result<bool, SurfaceError> {
        match self.solver.solve_artifact(artifact).await {
            Ok(()) => {}
            Err(e) => {
                metrics::CHALLENGE_ATTEMPTS
                    .with_label_values(&["solver_error"])
                    .inc();
                warn!("Challenge solver failed: {}", e);
                return Ok(false);
            }
        }
        let text = artifact.text.as_str();

        let input =
            cancellable(cancel, surface.wait_for_control(&self.input, self.load_timeout)).await?;
        let clear = script::clear_field(self.input.as_str());
        cancellable(cancel, surface.evaluate(&clear)).await?;
        cancellable(cancel, surface.type_text(&input, text)).await?;
        let submit =
            cancellable(cancel, surface.wait_for_control(&self.submit, self.load_timeout)).await?;
        cancellable(cancel, surface.click(&submit)).await?;

        let passed = &script::challenge_passed(&self.panel);
        let accepted = poll_until(
            "challenge acceptance",
            self.success_probe,
            ACCEPT_POLL,
            cancel,
            move || async move {
                let value = surface.evaluate(passed).await?;
                Ok(value.as_bool().filter(|passed| *passed))
            },
        )
        .await;

        match accepted {
            Ok(_) => Ok(true),
            Err(SurfaceError::Timeout { .. }) => {
                metrics::CHALLENGE_ATTEMPTS.with_label_values(&["rejected"]).inc();
                debug!(text = %text, "Challenge answer rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for the first challenge image, or for the allocation frame if the
    /// target decided not to challenge this session.
    async fn first_image(
        &self,
        surface: &dyn Surface,
        cancel: &CancellationToken,
    ) -> Result<Presented, SurfaceError> {
        poll_until(
            "challenge image",
            self.load_timeout,
            IMAGE_POLL,
            cancel,
            move || async move {
                if let Some(image) = self.current_image(surface).await? {
                    return Ok(Some(Presented::Challenge(image)));
                }
                match surface
                    .wait_for_control(&self.allocation_frame, Duration::ZERO)
                    .await
                {
                    Ok(_) => Ok(Some(Presented::Skipped)),
                    Err(SurfaceError::Timeout { .. }) => Ok(None),
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }

    /// Requests a new image and waits until it differs from `previous`.
    /// The returned artifact starts a fresh cycle with no recognized text.
    async fn reload(
        &self,
        surface: &dyn Surface,
        previous: &ChallengeArtifact,
        cancel: &CancellationToken,
    ) -> Result<ChallengeArtifact, SurfaceError> {
        let reload =
            cancellable(cancel, surface.wait_for_control(&self.reload, self.load_timeout)).await?;
        cancellable(cancel, surface.click(&reload)).await?;

        let image = poll_until(
            "fresh challenge image",
            self.refresh_timeout,
            IMAGE_POLL,
            cancel,
            move || async move {
                Ok(self
                    .current_image(surface)
                    .await?
                    .filter(|image| previous.differs_from(image)))
            },
        )
        .await?;
        Ok(ChallengeArtifact::new(image))
    }

    async fn current_image(
        &self,
        surface: &dyn Surface,
    ) -> Result<Option<Vec<u8>>, SurfaceError> {
        let fetch = script::challenge_image(&self.image);
        let value = surface.evaluate(&fetch).await?;
        match value.as_str() {
            None | Some("") => Ok(None),
            Some(src) => decode_data_url(src)
                .map(Some)
                .map_err(|e| SurfaceError::script(fetch.name(), e.to_string())),
        }
    }
}
