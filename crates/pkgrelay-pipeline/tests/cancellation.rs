//! Cancel, shutdown and restart behaviour, including processes that share
//! one database.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use common::{Harness, RecordingTransport, ScriptedStrategy, chain, drain, sharing};
use pkgrelay_core::{FailureReason, JobRepositoryPort, UnavailableReason};
use pkgrelay_db::TestDb;
use pkgrelay_pipeline::{
    AssetRequest, CancelOutcome, DispatcherConfig, Job, JobState, RelayDispatcherPort, RelayError,
    RelayEvent,
};

fn request(asset: &str) -> AssetRequest {
    AssetRequest::with_defaults(asset, "42")
}

#[tokio::test]
async fn cancelling_a_queued_job_removes_it() {
    let primary = ScriptedStrategy::bytes("remote", b"x");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let transport = RecordingTransport::new();
    let mut harness = Harness::new(chain(primary.clone(), fallback), transport.clone()).await;

    // Runner not started: the job stays queued
    let handle = harness
        .dispatcher
        .enqueue(request("com.example.app"))
        .await
        .unwrap();

    let outcome = harness.dispatcher.cancel(&handle.id).await.unwrap();
    assert_eq!(outcome, CancelOutcome::Removed);
    assert!(matches!(
        harness.dispatcher.get_job(&handle.id).await,
        Err(RelayError::JobNotFound { .. })
    ));
    assert!(harness.db.job_repository().load_all().await.unwrap().is_empty());

    drain(&harness.dispatcher).await;
    assert_eq!(primary.calls(), 0);
    assert!(transport.uploads().is_empty());
    assert!(
        harness
            .drain_events()
            .iter()
            .any(|e| matches!(e, RelayEvent::JobRemoved { id } if *id == handle.id))
    );
}

#[tokio::test]
async fn cancelling_a_relaying_job_closes_its_stream() {
    let (primary, dropped) = ScriptedStrategy::stalled("remote");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let mut harness = Harness::new(chain(primary, fallback), RecordingTransport::new()).await;

    let handle = harness
        .dispatcher
        .enqueue(request("com.example.app"))
        .await
        .unwrap();
    harness.dispatcher.ensure_runner();
    harness.wait_for_state(handle.id, JobState::Relaying).await;

    let outcome = harness.dispatcher.cancel(&handle.id).await.unwrap();
    assert_eq!(outcome, CancelOutcome::Cancelling);
    harness.wait_for_state(handle.id, JobState::Failed).await;

    let job = harness.dispatcher.get_job(&handle.id).await.unwrap();
    assert_eq!(job.last_error, Some(FailureReason::Cancelled));
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancelling_an_acquiring_job_drops_the_strategy_call() {
    let (primary, dropped) = ScriptedStrategy::blocking("remote");
    let fallback = ScriptedStrategy::bytes("local", b"never relayed");
    let transport = RecordingTransport::new();
    let mut harness = Harness::new(chain(primary.clone(), fallback.clone()), transport.clone()).await;

    let handle = harness
        .dispatcher
        .enqueue(request("com.example.app"))
        .await
        .unwrap();
    harness.dispatcher.ensure_runner();
    harness.wait_for_state(handle.id, JobState::Acquiring).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while primary.calls() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let outcome = harness.dispatcher.cancel(&handle.id).await.unwrap();
    assert_eq!(outcome, CancelOutcome::Cancelling);
    harness.wait_for_state(handle.id, JobState::Failed).await;

    let job = harness.dispatcher.get_job(&handle.id).await.unwrap();
    assert_eq!(job.last_error, Some(FailureReason::Cancelled));
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(fallback.calls(), 0);
    assert!(transport.uploads().is_empty());

    let stored = harness.db.job_repository().load_all().await.unwrap();
    assert_eq!(stored[0].state, JobState::Failed);
}

#[tokio::test]
async fn cancelling_a_finished_job_is_rejected() {
    let primary = ScriptedStrategy::bytes("remote", b"x");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let harness = Harness::new(chain(primary, fallback), RecordingTransport::new()).await;

    let handle = harness
        .dispatcher
        .enqueue(request("com.example.app"))
        .await
        .unwrap();
    drain(&harness.dispatcher).await;

    let err = harness.dispatcher.cancel(&handle.id).await.unwrap_err();
    assert!(matches!(err, RelayError::AlreadyTerminal { .. }));
}

#[tokio::test]
async fn clearing_an_active_job_is_rejected() {
    let (primary, _dropped) = ScriptedStrategy::stalled("remote");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let mut harness = Harness::new(chain(primary, fallback), RecordingTransport::new()).await;

    let handle = harness
        .dispatcher
        .enqueue(request("com.example.app"))
        .await
        .unwrap();
    harness.dispatcher.ensure_runner();
    harness.wait_for_state(handle.id, JobState::Relaying).await;

    let err = harness.dispatcher.clear(&handle.id).await.unwrap_err();
    assert!(matches!(err, RelayError::JobNotTerminal { .. }));

    harness.dispatcher.shutdown().await;
}

#[tokio::test]
async fn cancel_all_empties_queue_and_stops_running_jobs() {
    let (primary, dropped) = ScriptedStrategy::stalled("remote");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let mut harness = Harness::with_config(
        chain(primary, fallback),
        RecordingTransport::new(),
        DispatcherConfig::default().with_max_concurrent(1),
    )
    .await;

    let running = harness
        .dispatcher
        .enqueue(request("com.example.one"))
        .await
        .unwrap();
    let waiting = harness
        .dispatcher
        .enqueue(request("com.example.two"))
        .await
        .unwrap();
    harness.dispatcher.ensure_runner();
    harness.wait_for_state(running.id, JobState::Relaying).await;

    assert_eq!(harness.dispatcher.cancel_all().await.unwrap(), 2);
    drain(&harness.dispatcher).await;

    let job = harness.dispatcher.get_job(&running.id).await.unwrap();
    assert_eq!(job.last_error, Some(FailureReason::Cancelled));
    assert!(harness.dispatcher.get_job(&waiting.id).await.is_err());
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_cancels_active_and_keeps_queued() {
    let (primary, dropped) = ScriptedStrategy::stalled("remote");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let mut harness = Harness::with_config(
        chain(primary, fallback),
        RecordingTransport::new(),
        DispatcherConfig::default().with_max_concurrent(1),
    )
    .await;

    let running = harness
        .dispatcher
        .enqueue(request("com.example.one"))
        .await
        .unwrap();
    let waiting = harness
        .dispatcher
        .enqueue(request("com.example.two"))
        .await
        .unwrap();
    harness.dispatcher.ensure_runner();
    harness.wait_for_state(running.id, JobState::Relaying).await;

    assert_eq!(harness.dispatcher.shutdown().await, 1);

    let job = harness.dispatcher.get_job(&running.id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error, Some(FailureReason::Cancelled));
    assert_eq!(
        harness.dispatcher.get_job(&waiting.id).await.unwrap().state,
        JobState::Queued
    );
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn restart_fails_interrupted_jobs_and_resumes_queued_ones() {
    let db = TestDb::new().await.unwrap();
    let repo = db.job_repository();

    let mut interrupted = Job::new(request("com.example.one"), Utc::now());
    interrupted.state = JobState::Relaying;
    interrupted.attempts = 1;
    repo.upsert(&interrupted).await.unwrap();
    let waiting = Job::new(request("com.example.two"), Utc::now());
    repo.upsert(&waiting).await.unwrap();

    let primary = ScriptedStrategy::bytes("remote", b"x");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let transport = RecordingTransport::new();
    let mut harness = Harness::on_db(
        db,
        chain(primary, fallback),
        transport.clone(),
        DispatcherConfig::default(),
    );

    let summary = harness.dispatcher.restore().await.unwrap();
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.resumed, 1);
    assert_eq!(summary.interrupted, vec![interrupted.id]);

    drain(&harness.dispatcher).await;

    let failed = harness.dispatcher.get_job(&interrupted.id).await.unwrap();
    assert_eq!(failed.state, JobState::Failed);
    assert_eq!(failed.last_error, Some(FailureReason::Interrupted));
    assert_eq!(
        harness.dispatcher.get_job(&waiting.id).await.unwrap().state,
        JobState::Succeeded
    );

    let uploads = transport.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].destination, waiting.request.destination_path());

    let stored = harness.db.job_repository().load_all().await.unwrap();
    assert!(stored.iter().all(|job| job.state.is_terminal()));
    assert!(harness.drain_events().iter().any(|e| matches!(
        e,
        RelayEvent::JobStateChanged { id, state: JobState::Failed, error: Some(FailureReason::Interrupted) }
            if *id == interrupted.id
    )));
}

#[tokio::test]
async fn loading_in_another_process_leaves_a_running_job_alone() {
    let (primary, _dropped) = ScriptedStrategy::stalled("remote");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let mut runner = Harness::new(chain(primary, fallback), RecordingTransport::new()).await;

    let handle = runner
        .dispatcher
        .enqueue(request("com.example.app"))
        .await
        .unwrap();
    runner.dispatcher.ensure_runner();
    runner.wait_for_state(handle.id, JobState::Relaying).await;

    let observer = sharing(
        &runner.db,
        chain(
            ScriptedStrategy::bytes("remote", b"x"),
            ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled),
        ),
        RecordingTransport::new(),
        DispatcherConfig::default(),
    );
    assert_eq!(observer.load().await.unwrap(), 1);

    let seen = observer.get_job(&handle.id).await.unwrap();
    assert_eq!(seen.state, JobState::Relaying);
    assert!(seen.last_error.is_none());
    let stored = runner.db.job_repository().load_all().await.unwrap();
    assert_eq!(stored[0].state, JobState::Relaying);

    runner.dispatcher.shutdown().await;
}

#[tokio::test]
async fn idle_runner_picks_up_jobs_queued_by_another_process() {
    let primary = ScriptedStrategy::bytes("remote", b"payload");
    let fallback = ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled);
    let transport = RecordingTransport::new();
    let config = DispatcherConfig::default().with_storage_poll(Duration::from_millis(20));
    let mut runner = Harness::with_config(chain(primary, fallback), transport.clone(), config).await;
    runner.dispatcher.restore().await.unwrap();
    runner.dispatcher.ensure_runner();

    let other = sharing(
        &runner.db,
        chain(
            ScriptedStrategy::bytes("remote", b"x"),
            ScriptedStrategy::unavailable("local", UnavailableReason::NotInstalled),
        ),
        RecordingTransport::new(),
        DispatcherConfig::default(),
    );
    other.load().await.unwrap();
    let handle = other.enqueue(request("com.example.app")).await.unwrap();

    runner.wait_for_state(handle.id, JobState::Succeeded).await;
    assert_eq!(transport.uploads()[0].body, b"payload");
    let stored = runner.db.job_repository().load_all().await.unwrap();
    assert_eq!(stored[0].state, JobState::Succeeded);
}
