//! Failover state machine and controller tests against in-memory cloud services.
//!
//! Instants are passed explicitly, so the shutdown delay is exercised without
//! sleeping.

mod common;

use std::time::Duration;

use common::*;
use edge_failover::controller;
use edge_failover::error::FailoverError;
use edge_failover::failover::{FailoverMachine, FailoverMode, ShutdownCheck, Transition};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn machine() -> (FailoverMachine, CloudLog, std::sync::Arc<MemoryProvider>) {
    let log = CloudLog::new();
    let provider = MemoryProvider::new(log.clone());
    let machine = FailoverMachine::new(test_plan(), provider.clone());
    (machine, log, provider)
}

// =========================================================================
// Entering fallback
// =========================================================================

#[tokio::test]
async fn unknown_and_closed_enters_fallback_capacity_first() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    let report = machine.observe(true, now).await.unwrap();

    assert_eq!(report.transition, Transition::Switched(FailoverMode::Fallback));
    assert_eq!(report.status.mode, Some(FailoverMode::Fallback));
    assert_eq!(report.status.pending_shutdown, None);
    assert_eq!(log.calls(), enter_sequence());
}

#[tokio::test]
async fn normal_and_closed_enters_fallback() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    log.clear();

    let report = machine.observe(true, now + Duration::from_secs(30)).await.unwrap();

    assert_eq!(report.transition, Transition::Switched(FailoverMode::Fallback));
    assert_eq!(log.calls(), enter_sequence());
}

#[tokio::test]
async fn steady_fallback_makes_no_calls() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(true, now).await.unwrap();
    log.clear();

    let report = machine.observe(true, now + Duration::from_secs(30)).await.unwrap();

    assert_eq!(report.transition, Transition::Unchanged);
    assert_eq!(report.shutdown, ShutdownCheck::Idle);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn failed_capacity_stops_enter_sequence() {
    let (mut machine, log, _) = machine();
    log.fail(Fault::Capacity(1));

    let report = machine.observe(true, Instant::now()).await.unwrap();

    assert!(matches!(
        report.transition,
        Transition::Failed { target: FailoverMode::Fallback, .. }
    ));
    assert_eq!(report.status.mode, None);
    // Traffic is never redirected to a group that could not be scaled up.
    assert_eq!(log.calls(), vec![capacity(1)]);
}

#[tokio::test]
async fn failed_enter_is_retried_next_tick() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();
    log.fail(Fault::Retarget(FALLBACK_ORIGIN.to_string()));

    machine.observe(true, now).await.unwrap();
    assert_eq!(machine.status().mode, None);

    log.heal(&Fault::Retarget(FALLBACK_ORIGIN.to_string()));
    log.clear();

    let report = machine.observe(true, now + Duration::from_secs(30)).await.unwrap();

    assert_eq!(report.transition, Transition::Switched(FailoverMode::Fallback));
    assert_eq!(log.calls(), enter_sequence());
}

// =========================================================================
// Leaving fallback
// =========================================================================

#[tokio::test]
async fn unknown_and_open_exits_fallback_with_pending_shutdown() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    let report = machine.observe(false, now).await.unwrap();

    assert_eq!(report.transition, Transition::Switched(FailoverMode::Normal));
    assert_eq!(report.status.mode, Some(FailoverMode::Normal));
    assert_eq!(report.status.pending_shutdown, Some(now + SHUTDOWN_DELAY));
    assert_eq!(
        report.shutdown,
        ShutdownCheck::Waiting {
            remaining: SHUTDOWN_DELAY
        }
    );
    assert_eq!(log.calls(), exit_sequence());
}

#[tokio::test]
async fn fallback_and_open_restores_primary_path() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(true, now).await.unwrap();
    log.clear();

    let later = now + Duration::from_secs(60);
    let report = machine.observe(false, later).await.unwrap();

    assert_eq!(report.transition, Transition::Switched(FailoverMode::Normal));
    assert_eq!(report.status.pending_shutdown, Some(later + SHUTDOWN_DELAY));
    assert_eq!(log.calls(), exit_sequence());
}

#[tokio::test]
async fn partial_exit_failure_leaves_mode_unknown() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(true, now).await.unwrap();
    log.clear();
    log.fail(Fault::Zone(ZONE_B.to_string()));

    let report = machine.observe(false, now + Duration::from_secs(30)).await.unwrap();

    assert!(matches!(
        report.transition,
        Transition::Failed { target: FailoverMode::Normal, .. }
    ));
    assert_eq!(report.status.mode, None);
    assert_eq!(report.status.pending_shutdown, None);
    // Both zones were attempted.
    assert_eq!(log.calls(), exit_sequence());
}

// =========================================================================
// Delayed shutdown
// =========================================================================

#[tokio::test]
async fn group_not_scaled_down_before_deadline() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    log.clear();

    let almost = now + SHUTDOWN_DELAY - Duration::from_secs(1);
    let report = machine.observe(false, almost).await.unwrap();

    assert_eq!(report.transition, Transition::Unchanged);
    assert_eq!(
        report.shutdown,
        ShutdownCheck::Waiting {
            remaining: Duration::from_secs(1)
        }
    );
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn group_scaled_down_once_deadline_passes() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    log.clear();

    let report = machine.observe(false, now + SHUTDOWN_DELAY).await.unwrap();
    assert_eq!(report.shutdown, ShutdownCheck::Completed);
    assert_eq!(report.status.pending_shutdown, None);
    assert_eq!(log.calls(), vec![capacity(0)]);

    let report = machine
        .observe(false, now + SHUTDOWN_DELAY + Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(report.shutdown, ShutdownCheck::Idle);
    assert_eq!(log.capacity_calls(), vec![0]);
}

#[tokio::test]
async fn failed_shutdown_is_retried() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    log.clear();
    log.fail(Fault::Capacity(0));

    let report = machine.observe(false, now + SHUTDOWN_DELAY).await.unwrap();
    assert!(matches!(report.shutdown, ShutdownCheck::Failed(_)));
    assert_eq!(report.status.pending_shutdown, Some(now + SHUTDOWN_DELAY));

    log.heal(&Fault::Capacity(0));
    let report = machine
        .observe(false, now + SHUTDOWN_DELAY + Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(report.shutdown, ShutdownCheck::Completed);
    assert_eq!(log.capacity_calls(), vec![0, 0]);
}

#[tokio::test]
async fn reentering_fallback_cancels_pending_shutdown() {
    let (mut machine, log, _) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    machine.observe(true, now + Duration::from_secs(30)).await.unwrap();
    assert_eq!(machine.status().pending_shutdown, None);
    log.clear();

    // Well past the old deadline, still failed over: the group must stay up.
    let report = machine
        .observe(true, now + SHUTDOWN_DELAY * 2)
        .await
        .unwrap();
    assert_eq!(report.shutdown, ShutdownCheck::Idle);
    assert!(log.capacity_calls().is_empty());
}

// =========================================================================
// Client construction
// =========================================================================

#[tokio::test]
async fn connect_failure_aborts_tick_and_clears_state() {
    let (mut machine, log, provider) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    machine.observe(true, now + Duration::from_secs(1)).await.unwrap();
    log.clear();
    provider.set_fail_connect(true);

    let result = machine.observe(false, now + Duration::from_secs(2)).await;

    assert!(matches!(result, Err(FailoverError::Cloud(_))));
    assert_eq!(machine.status().mode, None);
    assert_eq!(machine.status().pending_shutdown, None);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn connect_failure_skips_shutdown_check() {
    let (mut machine, log, provider) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    log.clear();
    provider.set_fail_connect(true);

    let result = machine.observe(false, now + SHUTDOWN_DELAY).await;

    assert!(matches!(result, Err(FailoverError::Cloud(_))));
    assert_eq!(machine.status().mode, Some(FailoverMode::Normal));
    assert_eq!(machine.status().pending_shutdown, Some(now + SHUTDOWN_DELAY));
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn clients_built_only_when_a_call_is_due() {
    let (mut machine, _, provider) = machine();
    let now = Instant::now();

    machine.observe(false, now).await.unwrap();
    assert_eq!(provider.connects(), 1);

    // Steady state before the deadline needs no clients.
    machine.observe(false, now + Duration::from_secs(30)).await.unwrap();
    assert_eq!(provider.connects(), 1);

    machine.observe(false, now + SHUTDOWN_DELAY).await.unwrap();
    assert_eq!(provider.connects(), 2);

    machine
        .observe(false, now + SHUTDOWN_DELAY + Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(provider.connects(), 2);
}

// =========================================================================
// Controller
// =========================================================================

#[tokio::test]
async fn handle_publishes_status_after_each_observation() {
    let (machine, log, _) = machine();
    let cancel = CancellationToken::new();
    let (handle, task) = controller::spawn(machine, cancel.clone());

    assert_eq!(handle.status().mode, None);

    let report = handle.observe(true).await.unwrap();
    assert_eq!(report.status.mode, Some(FailoverMode::Fallback));
    assert_eq!(handle.status().mode, Some(FailoverMode::Fallback));
    assert_eq!(log.calls(), enter_sequence());

    cancel.cancel();
    task.await.unwrap();

    assert!(matches!(
        handle.observe(false).await,
        Err(FailoverError::ControllerStopped)
    ));
}

#[tokio::test]
async fn concurrent_observations_are_serialized() {
    let (machine, log, _) = machine();
    let cancel = CancellationToken::new();
    let (handle, _task) = controller::spawn(machine, cancel.clone());

    let a = handle.clone();
    let b = handle.clone();
    let (first, second) = tokio::join!(a.observe(true), b.observe(true));
    first.unwrap();
    second.unwrap();

    // The second observation saw the completed first transition.
    assert_eq!(log.calls(), enter_sequence());
    cancel.cancel();
}
