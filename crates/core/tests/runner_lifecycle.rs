//! End-to-end runner lifecycle tests against real (fake) child processes.
//!
//! The bundles here swap the Python interpreter for `sh` scripts so the
//! tests stay hermetic while still exercising spawn, output streaming,
//! exit observation and signalling.

use rk_core::bundles::{BundleSet, RobotBundle};
use rk_core::runner::{RobotRunner, RunnerError};
use rk_core::status::StatusStore;
use rk_protocol::{RobotKind, RunState, RunStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn fake_bundle(kind: RobotKind, dir: &Path, script: &str) -> RobotBundle {
    RobotBundle {
        kind,
        dir: dir.to_path_buf(),
        program: "sh".into(),
        args: vec!["-c".to_string(), script.to_string()],
        packages: Vec::new(),
    }
}

fn runner_with(bundles: Vec<RobotBundle>) -> (RobotRunner, Arc<StatusStore>) {
    let mut set = BundleSet::default();
    for bundle in bundles {
        set.insert(bundle);
    }
    let status = Arc::new(StatusStore::new());
    let runner = RobotRunner::new(Arc::new(set), Arc::clone(&status));
    (runner, status)
}

async fn wait_for_state(store: &StatusStore, state: RunState) -> RunStatus {
    for _ in 0..200u32 {
        let snapshot = store.snapshot().await;
        if snapshot.state == state {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!(
        "timed out waiting for {:?}, last state {:?}",
        state,
        store.snapshot().await.state
    );
}

#[tokio::test]
async fn test_completed_run_classifies_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Progress lines go to stdout so their order is deterministic; the
    // stderr line has no structured effect and may interleave anywhere.
    let script = r#"
echo "Iniciando navegador"
echo "Found 3 items"
echo "[1/3] PROCESSANDO: alpha"
echo "[3/3] PROCESSANDO: gamma"
echo "browser session log" >&2
"#;
    let (runner, status) = runner_with(vec![fake_bundle(RobotKind::Stf, dir.path(), script)]);

    runner.start(RobotKind::Stf).await.expect("start");
    let snapshot = wait_for_state(&status, RunState::Completed).await;

    assert_eq!(snapshot.robot, Some(RobotKind::Stf));
    assert_eq!(snapshot.processed, 3);
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.current.as_deref(), Some("gamma"));
    assert_eq!(snapshot.message.as_deref(), Some("Starting browser"));
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.finished_at.is_some());
    assert!(snapshot.error.is_none());
    // The stderr line was captured as informational, not as an error.
    assert!(snapshot
        .log_tail
        .iter()
        .any(|e| e.text == "browser session log" && e.level == rk_protocol::LogLevel::Info));
}

#[tokio::test]
async fn test_nonzero_exit_becomes_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (runner, status) = runner_with(vec![fake_bundle(
        RobotKind::Stj,
        dir.path(),
        "echo working; exit 1",
    )]);

    runner.start(RobotKind::Stj).await.expect("start");
    let snapshot = wait_for_state(&status, RunState::Failed).await;

    assert_eq!(snapshot.robot, Some(RobotKind::Stj));
    assert!(snapshot.error.as_deref().unwrap_or("").contains("code 1"));
}

#[tokio::test]
async fn test_spawn_failure_reports_failed_and_leaves_nothing_tracked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = RobotBundle {
        program: "/nonexistent/interpreter".into(),
        ..fake_bundle(RobotKind::Stf, dir.path(), "true")
    };
    let (runner, status) = runner_with(vec![
        broken,
        fake_bundle(RobotKind::Stj, dir.path(), "sleep 5"),
    ]);

    let err = runner.start(RobotKind::Stf).await.expect_err("must fail");
    assert!(matches!(err, RunnerError::Spawn { .. }));

    let snapshot = status.snapshot().await;
    assert_eq!(snapshot.state, RunState::Failed);
    assert!(snapshot.error.is_some());

    // Nothing is tracked, so another start is accepted.
    runner.start(RobotKind::Stj).await.expect("second start");
    runner.stop().await.expect("stop");
}

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (runner, status) = runner_with(vec![
        fake_bundle(RobotKind::Stf, dir.path(), "sleep 5"),
        fake_bundle(RobotKind::Stj, dir.path(), "sleep 5"),
    ]);

    runner.start(RobotKind::Stf).await.expect("first start");
    let before = status.snapshot().await;

    let err = runner.start(RobotKind::Stj).await.expect_err("must reject");
    assert!(matches!(err, RunnerError::AlreadyRunning));

    // The tracked run is still the first one, status unchanged.
    let after = status.snapshot().await;
    assert_eq!(after.robot, Some(RobotKind::Stf));
    assert_eq!(after.run_id, before.run_id);

    runner.stop().await.expect("stop");
}

#[tokio::test]
async fn test_stop_records_stopped_immediately() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (runner, status) = runner_with(vec![fake_bundle(RobotKind::Stf, dir.path(), "sleep 10")]);

    runner.start(RobotKind::Stf).await.expect("start");
    runner.stop().await.expect("stop");

    let snapshot = status.snapshot().await;
    assert_eq!(snapshot.state, RunState::Stopped);
    assert!(snapshot.finished_at.is_some());

    // The reaped exit must not overwrite the Stopped state.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(status.snapshot().await.state, RunState::Stopped);
}

#[tokio::test]
async fn test_stop_without_a_run_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (runner, status) = runner_with(vec![fake_bundle(RobotKind::Stf, dir.path(), "true")]);

    let err = runner.stop().await.expect_err("must reject");
    assert!(matches!(err, RunnerError::NoActiveProcess));
    assert_eq!(status.snapshot().await.state, RunState::Idle);
}

#[tokio::test]
async fn test_missing_bundle_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gone = dir.path().join("not-there");
    let (runner, status) = runner_with(vec![fake_bundle(RobotKind::Stf, &gone, "true")]);

    let err = runner.start(RobotKind::Stf).await.expect_err("must fail");
    assert!(matches!(err, RunnerError::BundleMissing { .. }));
    assert_eq!(status.snapshot().await.state, RunState::Idle);
}

#[tokio::test]
async fn test_unknown_robot_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Only stf registered; stj has no bundle.
    let (runner, _status) = runner_with(vec![fake_bundle(RobotKind::Stf, dir.path(), "true")]);

    let err = runner.start(RobotKind::Stj).await.expect_err("must fail");
    assert!(matches!(err, RunnerError::UnknownRobot(RobotKind::Stj)));
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (runner, status) = runner_with(vec![fake_bundle(
        RobotKind::Stf,
        dir.path(),
        "echo '[1/1]'",
    )]);

    runner.start(RobotKind::Stf).await.expect("start");
    wait_for_state(&status, RunState::Completed).await;

    runner.reset().await;
    let snapshot = status.snapshot().await;
    assert_eq!(snapshot.state, RunState::Idle);
    assert!(snapshot.robot.is_none());
    assert!(snapshot.log_tail.is_empty());

    // A new run is accepted after reset.
    runner.start(RobotKind::Stf).await.expect("restart");
    wait_for_state(&status, RunState::Completed).await;
}

#[tokio::test]
async fn test_new_run_resets_previous_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (runner, status) = runner_with(vec![
        fake_bundle(RobotKind::Stf, dir.path(), "echo 'Found 9 items'"),
        fake_bundle(RobotKind::Stj, dir.path(), "sleep 5"),
    ]);

    runner.start(RobotKind::Stf).await.expect("start stf");
    wait_for_state(&status, RunState::Completed).await;

    runner.reset().await;
    runner.start(RobotKind::Stj).await.expect("start stj");

    let snapshot = status.snapshot().await;
    assert_eq!(snapshot.robot, Some(RobotKind::Stj));
    assert_eq!(snapshot.total, 0);
    assert!(snapshot.log_tail.is_empty());

    runner.stop().await.expect("stop");
}
