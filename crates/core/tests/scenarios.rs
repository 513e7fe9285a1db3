//! End-to-end scenarios through the acquisition service.
//!
//! Every test runs under paused tokio time: the mock clock follows tokio's
//! timer, so deadlines, polls and timeouts elapse instantly but in order.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use common::{base, Harness};
use curtaincall_core::{
    attempt::CommitStep,
    scheduler::{Phase, ScheduleOutcome},
    testing::{fixtures, fixtures::selectors, MockSolver, MockVenue},
    AttemptOutcome, AttemptState, FailureTag, OrchestratorError, SessionStore, SessionToken,
};

fn single_unit_venue() -> MockVenue {
    MockVenue::builder()
        .center_x(500.0)
        .partition("floor", 500.0, 100.0, 1)
        .build()
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_run_logs_in_and_acquires() {
    let harness = Harness::new(single_unit_venue());
    let service = harness.service();

    let report = assert_ok!(service.run(&CancellationToken::new()).await);

    let attempt = report
        .outcome
        .completed()
        .expect("acquisition phase should complete");
    match &attempt.outcome {
        AttemptOutcome::Succeeded {
            confirmation: Some(path),
        } => assert!(path.exists()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(attempt.attempt.started_at >= base() + TimeDelta::seconds(5));
    assert!(report.elapsed() >= TimeDelta::seconds(5));

    assert_eq!(
        harness.states(),
        vec![
            AttemptState::AwaitingChildSurface,
            AttemptState::SolvingChallenge,
            AttemptState::SearchingAllocation,
            AttemptState::Committing,
            AttemptState::Succeeded,
        ]
    );

    // Credentials were typed once and the new session persisted.
    let typed = harness.venue.parent.typed();
    assert_eq!(typed.len(), 2);
    assert_eq!(harness.saved_tokens().await.len(), 1);

    assert_eq!(harness.venue.held_unit(), Some("floor".to_string()));
    let frame_clicks = harness.venue.frame.clicks();
    assert_eq!(frame_clicks.last().map(String::as_str), Some(selectors::FINAL_SUBMIT));
    assert_eq!(harness.launcher.launch_count(), 1);
    assert_eq!(harness.launcher.shutdown_count(), 1);
    assert!(harness.venue.parent.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_sold_out_visits_every_partition_once_in_rank_order() {
    let venue = MockVenue::builder()
        .center_x(500.0)
        .partition("rear", 500.0, 300.0, 0)
        .partition("front-left", 100.0, 100.0, 0)
        .partition("front-center", 510.0, 100.0, 0)
        .partition("middle", 500.0, 200.0, 0)
        .build();
    let harness = Harness::new(venue);

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    let outcome = report.attempt_outcome().expect("attempt should run");
    assert_eq!(outcome.label(), "failed:sold-out");
    assert_eq!(outcome.failure_tag(), Some(FailureTag::SoldOut));
    assert_eq!(
        harness.venue.visits(),
        vec!["front-center", "front-left", "middle", "rear"]
    );
    assert_eq!(harness.venue.selection_violations(), 0);
    assert!(harness.venue.held_unit().is_none());
    assert!(!harness
        .venue
        .frame
        .clicks()
        .contains(&selectors::CONFIRM_SELECTION.to_string()));
    assert_eq!(harness.launcher.shutdown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_valid_persisted_token_skips_credential_entry() {
    let harness = Harness::with_valid_token(single_unit_venue());

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    assert!(report.succeeded());
    assert!(harness.venue.parent.typed().is_empty());
    assert!(!harness
        .venue
        .parent
        .clicks()
        .contains(&selectors::LOGIN_SUBMIT.to_string()));
    assert_eq!(harness.store.discard_count().await, 0);
    assert!(harness.saved_tokens().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_token_is_discarded_and_replaced() {
    let harness = Harness::new(single_unit_venue());
    harness
        .store
        .save(&SessionToken::new(b"sid=expired".to_vec()))
        .await
        .unwrap();

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    assert!(report.succeeded());
    assert_eq!(harness.store.discard_count().await, 1);
    let stored = harness.store.stored().await.expect("new token stored");
    assert_eq!(stored.bytes(), fixtures::VALID_SESSION);
}

#[tokio::test(start_paused = true)]
async fn test_challenge_passes_on_fourth_attempt() {
    let harness = Harness::new(single_unit_venue())
        .with_solver(MockSolver::with_answers(vec!["wrng", "wrng", "wrng", "abcd"]));

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    let attempt = report.outcome.completed().expect("attempt should run");
    assert!(attempt.outcome.is_success());
    assert_eq!(attempt.attempt.challenge_attempts(), 4);
    assert_eq!(attempt.attempt.challenge_reloads(), 3);
    assert_eq!(harness.venue.challenge_reloads(), 3);
    assert_eq!(
        harness.venue.challenge_submissions(),
        vec!["WRNG", "WRNG", "WRNG", "ABCD"]
    );
    assert!(harness.states().contains(&AttemptState::SearchingAllocation));

    // Each attempt saw a fresh image.
    let images = harness.solver.recorded_images().await;
    assert_eq!(images.len(), 4);
    assert_ne!(images[0], images[1]);
}

#[tokio::test(start_paused = true)]
async fn test_challenge_exhausted_after_max_attempts() {
    let harness = Harness::new(single_unit_venue())
        .with_solver(MockSolver::with_answers(vec!["wrng"]));
    let max_attempts = harness.config.challenge.max_attempts;

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    let attempt = report.outcome.completed().expect("attempt should run");
    assert_eq!(attempt.outcome.label(), "failed:challenge-exhausted");
    assert_eq!(attempt.attempt.challenge_attempts(), max_attempts);
    assert_eq!(harness.venue.challenge_reloads(), max_attempts - 1);
    assert!(!harness.states().contains(&AttemptState::SearchingAllocation));
    assert!(harness.venue.visits().is_empty());
    assert_eq!(harness.launcher.shutdown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_deadlines_rejected_before_launch() {
    let mut harness = Harness::new(single_unit_venue());
    harness.config.schedule.session_open = (base() + TimeDelta::seconds(10)).to_rfc3339();
    harness.config.schedule.acquisition_open = (base() + TimeDelta::seconds(5)).to_rfc3339();

    let result = harness.service().run(&CancellationToken::new()).await;

    assert!(matches!(result, Err(OrchestratorError::Config(_))));
    assert_eq!(harness.launcher.launch_count(), 0);
    assert_eq!(harness.launcher.shutdown_count(), 0);
    assert!(harness.states().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_past_deadline_rejected() {
    let mut harness = Harness::new(single_unit_venue());
    harness.config.schedule.session_open = (base() - TimeDelta::seconds(60)).to_rfc3339();

    let result = harness.service().run(&CancellationToken::new()).await;

    assert!(matches!(result, Err(OrchestratorError::Config(_))));
    assert_eq!(harness.launcher.launch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_phases_releases_once() {
    let harness = Harness::new(single_unit_venue());
    let service = harness.service();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let report = assert_ok!(service.run(&cancel).await);

    assert!(matches!(report.outcome, ScheduleOutcome::Cancelled { phase: None }));
    assert!(harness.states().is_empty());
    assert_eq!(harness.launcher.launch_count(), 1);
    assert_eq!(harness.launcher.shutdown_count(), 1);
    assert!(!service.status().running);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_acquisition_aborts_attempt() {
    // The unit view never loads, so the search sits in its probe wait.
    let venue = MockVenue::builder()
        .partition("slow", 0.0, 100.0, 1)
        .slow_units("slow")
        .build();
    let harness = Harness::new(venue);
    let service = harness.service();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        trigger.cancel();
    });

    let report = assert_ok!(service.run(&cancel).await);

    assert!(matches!(
        report.outcome,
        ScheduleOutcome::Cancelled {
            phase: Some(Phase::AcquisitionOpen)
        }
    ));
    assert_eq!(harness.states().last(), Some(&AttemptState::Aborted));
    assert_eq!(harness.launcher.shutdown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials_end_run_without_attempt() {
    let mut harness = Harness::new(single_unit_venue());
    harness.config.credentials.password = "wrong".to_string();

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    assert!(matches!(report.outcome, ScheduleOutcome::SessionFailed(_)));
    assert!(harness.states().is_empty());
    assert!(harness.venue.visits().is_empty());
    assert!(harness.saved_tokens().await.is_empty());
    assert_eq!(harness.launcher.shutdown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_commit_control_is_a_contract_mismatch() {
    let venue = MockVenue::builder()
        .partition("floor", 0.0, 100.0, 1)
        .without_control(selectors::FINAL_SUBMIT)
        .build();
    let harness = Harness::new(venue);

    let report = assert_ok!(harness.service().run(&CancellationToken::new()).await);

    let outcome = report.attempt_outcome().expect("attempt should run");
    assert_eq!(
        outcome.failure_tag(),
        Some(FailureTag::CommitStepMissing(CommitStep::FinalSubmit))
    );
    assert_eq!(harness.venue.held_unit(), Some("floor".to_string()));
    assert_eq!(harness.launcher.shutdown_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_concurrent_run_is_refused() {
    let harness = Harness::new(single_unit_venue());
    let service = Arc::new(harness.service());
    let cancel = CancellationToken::new();

    let first = {
        let service = Arc::clone(&service);
        let cancel = cancel.clone();
        tokio::spawn(async move { service.run(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = service.run(&cancel).await;
    assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));

    cancel.cancel();
    let first = first.await.unwrap();
    assert!(first.is_ok());
    assert_eq!(service.status().runs, 1);
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_fires_once_when_clock_steps_back() {
    let harness = Harness::new(single_unit_venue());
    let service = harness.service();
    let fired = Arc::new(AtomicUsize::new(0));

    // Step the wall clock back across the acquisition deadline once it has fired.
    let clock = harness.clock.clone();
    let seen = Arc::clone(&fired);
    let states = Arc::clone(&harness.states);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if states.lock().unwrap().contains(&AttemptState::AwaitingChildSurface) {
                seen.fetch_add(1, Ordering::SeqCst);
                clock.rewind(TimeDelta::seconds(3));
                break;
            }
        }
    });

    let report = assert_ok!(service.run(&CancellationToken::new()).await);

    assert!(report.succeeded());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let started = harness
        .states()
        .iter()
        .filter(|s| **s == AttemptState::AwaitingChildSurface)
        .count();
    assert_eq!(started, 1);
    assert_eq!(harness.launcher.launch_count(), 1);
}
