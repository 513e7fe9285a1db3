//! The scheduler loop.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::metrics;

use super::config::SchedulerConfig;
use super::schedule::Schedule;
use super::traits::PhaseHandler;
use super::types::{Deadline, Phase, ScheduleOutcome};

/// Fires the session and acquisition phases at their deadlines.
///
/// The loop polls the clock at the coarse rate until the next deadline is
/// inside the fine window, then at the fine rate. Phases run on spawned tasks
/// so the loop keeps observing cancellation while they execute.
pub struct Scheduler<S> {
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    session: Option<S>,
}

/// Phase tasks in flight.
struct PhaseTasks<S, O> {
    session: Option<JoinHandle<Result<S, String>>>,
    acquisition: Option<JoinHandle<O>>,
}

enum Event<S, O> {
    Cancelled,
    Session(Result<Result<S, String>, JoinError>),
    Acquisition(Result<O, JoinError>),
    Tick,
}

impl<S: Send + 'static> Scheduler<S> {
    pub fn new(schedule: Schedule, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            schedule,
            clock,
            config,
            session: None,
        }
    }

    /// Supplies the session up front; the session phase will not fire.
    pub fn with_session(mut self, session: S) -> Self {
        self.schedule.satisfy(Phase::SessionOpen);
        self.session = Some(session);
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Runs the schedule to a terminal state.
    ///
    /// `handler.release()` is called exactly once before this returns.
    pub async fn run<H>(
        mut self,
        handler: Arc<H>,
        cancel: &CancellationToken,
    ) -> ScheduleOutcome<H::Output>
    where
        H: PhaseHandler<Session = S>,
    {
        info!(
            session_open = %self.schedule.deadline(Phase::SessionOpen).at,
            acquisition_open = %self.schedule.deadline(Phase::AcquisitionOpen).at,
            session_supplied = self.session.is_some(),
            "Scheduler armed"
        );

        let phases = cancel.child_token();
        let mut tasks = PhaseTasks {
            session: None,
            acquisition: None,
        };

        let outcome = self.drive(&handler, cancel, &phases, &mut tasks).await;

        phases.cancel();
        wind_down(tasks.session.take(), Phase::SessionOpen, self.config.cancel_grace).await;
        wind_down(
            tasks.acquisition.take(),
            Phase::AcquisitionOpen,
            self.config.cancel_grace,
        )
        .await;

        handler.release().await;
        info!(outcome = %outcome.label(), "Scheduler finished");
        outcome
    }

    async fn drive<H>(
        &mut self,
        handler: &Arc<H>,
        cancel: &CancellationToken,
        phases: &CancellationToken,
        tasks: &mut PhaseTasks<S, H::Output>,
    ) -> ScheduleOutcome<H::Output>
    where
        H: PhaseHandler<Session = S>,
    {
        let mut acquisition_due = false;

        loop {
            let now = self.clock.now();
            while let Some(deadline) = self.schedule.poll(now) {
                record_fire(&deadline, now);
                match deadline.phase {
                    Phase::SessionOpen => {
                        let handler = Arc::clone(handler);
                        let token = phases.clone();
                        tasks.session = Some(tokio::spawn(async move {
                            handler.on_session(token).await.map_err(|e| e.to_string())
                        }));
                    }
                    Phase::AcquisitionOpen => {
                        if self.session.is_none() {
                            info!("Acquisition deadline reached before the session is ready");
                        }
                        acquisition_due = true;
                    }
                }
            }

            if acquisition_due && tasks.acquisition.is_none() {
                if let Some(session) = self.session.take() {
                    acquisition_due = false;
                    let handler = Arc::clone(handler);
                    let token = phases.clone();
                    tasks.acquisition = Some(tokio::spawn(async move {
                        handler.on_acquisition(session, token).await
                    }));
                    debug!("Acquisition phase started");
                }
            }

            let wait = self.next_wait(now);
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => Event::Cancelled,
                joined = join_phase(&mut tasks.session) => Event::Session(joined),
                joined = join_phase(&mut tasks.acquisition) => Event::Acquisition(joined),
                _ = tokio::time::sleep(wait) => Event::Tick,
            };

            match event {
                Event::Tick => {}
                Event::Cancelled => {
                    let phase = if tasks.acquisition.is_some() {
                        Some(Phase::AcquisitionOpen)
                    } else if tasks.session.is_some() {
                        Some(Phase::SessionOpen)
                    } else {
                        None
                    };
                    warn!(phase = ?phase, "Scheduler cancelled");
                    return ScheduleOutcome::Cancelled { phase };
                }
                Event::Session(joined) => {
                    tasks.session = None;
                    match joined {
                        Ok(Ok(session)) => {
                            info!("Session phase completed");
                            self.session = Some(session);
                        }
                        Ok(Err(cause)) => {
                            error!("Session phase failed: {}", cause);
                            return ScheduleOutcome::SessionFailed(cause);
                        }
                        Err(e) => return panicked(Phase::SessionOpen, e),
                    }
                }
                Event::Acquisition(joined) => {
                    tasks.acquisition = None;
                    return match joined {
                        Ok(output) => ScheduleOutcome::Completed(output),
                        Err(e) => panicked(Phase::AcquisitionOpen, e),
                    };
                }
            }
        }
    }

    fn next_wait(&self, now: DateTime<Utc>) -> Duration {
        match self.schedule.next_armed() {
            Some(next) => {
                let remaining = (next.at - now).to_std().unwrap_or(Duration::ZERO);
                self.config.poll_interval(remaining)
            }
            None => self.config.coarse_poll,
        }
    }
}

/// Waits for a phase task, or forever if there is none.
async fn join_phase<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Gives a cancelled phase task `grace` to finish, then aborts it.
async fn wind_down<T>(task: Option<JoinHandle<T>>, phase: Phase, grace: Duration) {
    let Some(mut handle) = task else {
        return;
    };
    if tokio::time::timeout(grace, &mut handle).await.is_err() {
        warn!(phase = %phase, grace = ?grace, "Phase did not stop within grace period, aborting");
        handle.abort();
        let _ = handle.await;
    }
}

fn record_fire(deadline: &Deadline, now: DateTime<Utc>) {
    let late = (now - deadline.at).to_std().unwrap_or(Duration::ZERO);
    metrics::FIRE_LATENESS
        .with_label_values(&[deadline.phase.as_str()])
        .observe(late.as_secs_f64());
    info!(
        phase = %deadline.phase,
        deadline = %deadline.at,
        late_ms = late.as_millis() as u64,
        "Deadline fired"
    );
}

fn panicked<T>(phase: Phase, err: JoinError) -> ScheduleOutcome<T> {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    };
    error!(phase = %phase, "Phase task panicked: {}", message);
    ScheduleOutcome::PhasePanicked { phase, message }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
