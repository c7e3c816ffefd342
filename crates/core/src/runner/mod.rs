//! Robot runner: single-slot lifecycle for the automation child process.
//!
//! At most one external process is tracked at a time, process-wide. The
//! runner owns every state transition of the shared [`rk_protocol::RunStatus`];
//! the HTTP facade only reads or delegates.
//!
//! State machine:
//! - Idle -> Running on a successful `start` (rejected while tracked)
//! - Running -> Completed on exit code 0
//! - Running -> Failed on nonzero exit or spawn failure
//! - Running -> Stopped on `stop` (recorded immediately, without waiting
//!   for the OS to confirm termination)
//! - terminal -> Idle on `reset`

pub mod child_stream;
pub mod error;

pub use child_stream::{ChildEvent, StreamSource};
pub use error::{RunnerError, RunnerResult};

use crate::bundles::BundleSet;
use crate::classify;
use crate::status::StatusStore;
use chrono::Utc;
use rk_protocol::{RobotKind, RunState, RunStatus};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use uuid::Uuid;

/// The child currently being tracked.
#[derive(Debug, Clone)]
struct TrackedChild {
    run_id: Uuid,
    kind: RobotKind,
    pid: Option<u32>,
}

/// Spawns and supervises one automation process at a time.
pub struct RobotRunner {
    bundles: Arc<BundleSet>,
    status: Arc<StatusStore>,
    tracked: Arc<Mutex<Option<TrackedChild>>>,
}

impl RobotRunner {
    pub fn new(bundles: Arc<BundleSet>, status: Arc<StatusStore>) -> Self {
        Self {
            bundles,
            status,
            tracked: Arc::new(Mutex::new(None)),
        }
    }

    /// The bundles this runner launches.
    pub fn bundles(&self) -> &BundleSet {
        &self.bundles
    }

    /// Launch the automation for `kind`.
    ///
    /// Rejects with [`RunnerError::AlreadyRunning`] while a child is
    /// tracked. On success the status record is replaced with a fresh
    /// Running record and the call returns immediately; completion is
    /// observed in the background. On spawn failure the status becomes
    /// Failed with the OS error and nothing is tracked.
    pub async fn start(&self, kind: RobotKind) -> RunnerResult<Uuid> {
        // Held across the spawn so concurrent starts serialize here.
        let mut tracked = self.tracked.lock().await;
        if tracked.is_some() {
            return Err(RunnerError::AlreadyRunning);
        }

        let bundle = self
            .bundles
            .get(kind)
            .ok_or(RunnerError::UnknownRobot(kind))?;
        if !bundle.dir.is_dir() {
            return Err(RunnerError::BundleMissing {
                path: bundle.dir.clone(),
            });
        }

        let mut command = Command::new(&bundle.program);
        command
            .args(&bundle.args)
            .current_dir(&bundle.dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let error = RunnerError::Spawn {
                    program: bundle.program.display().to_string(),
                    source,
                };
                let message = error.to_string();
                tracing::error!(robot = %kind, "{message}");
                self.status
                    .update(|status| {
                        *status = RunStatus::idle();
                        status.state = RunState::Failed;
                        status.robot = Some(kind);
                        status.error = Some(message);
                        status.finished_at = Some(Utc::now());
                    })
                    .await;
                return Err(error);
            }
        };

        let run_id = Uuid::new_v4();
        let pid = child.id();
        tracing::info!(robot = %kind, %run_id, pid, "robot started");

        self.status
            .update(|status| {
                *status = RunStatus::idle();
                status.state = RunState::Running;
                status.robot = Some(kind);
                status.run_id = Some(run_id);
                status.started_at = Some(Utc::now());
            })
            .await;

        *tracked = Some(TrackedChild { run_id, kind, pid });

        let events = child_stream::observe(child);
        tokio::spawn(drive_run(
            events,
            Arc::clone(&self.status),
            Arc::clone(&self.tracked),
            run_id,
            kind,
        ));

        Ok(run_id)
    }

    /// Stop the tracked run.
    ///
    /// Sends a termination signal (best-effort), records Stopped
    /// immediately and forgets the child without waiting for the OS. Late
    /// output from the dying process is tolerated by the exit observer.
    pub async fn stop(&self) -> RunnerResult<()> {
        let mut tracked = self.tracked.lock().await;
        let child = tracked.take().ok_or(RunnerError::NoActiveProcess)?;

        if let Some(pid) = child.pid {
            send_terminate(pid);
        }
        tracing::info!(robot = %child.kind, run_id = %child.run_id, "robot stopped by request");

        self.status
            .update(|status| {
                if status.run_id == Some(child.run_id) {
                    status.state = RunState::Stopped;
                    status.finished_at = Some(Utc::now());
                }
            })
            .await;

        Ok(())
    }

    /// Clear the tracked handle (without signalling) and restore the Idle
    /// record.
    pub async fn reset(&self) {
        let mut tracked = self.tracked.lock().await;
        *tracked = None;
        self.status.reset().await;
    }
}

/// Background task driving one run: applies output events to the status
/// record in delivery order, then finalizes the terminal state on exit.
async fn drive_run(
    mut events: std::pin::Pin<Box<dyn tokio_stream::Stream<Item = ChildEvent> + Send>>,
    status: Arc<StatusStore>,
    tracked: Arc<Mutex<Option<TrackedChild>>>,
    run_id: Uuid,
    kind: RobotKind,
) {
    while let Some(event) = events.next().await {
        match event {
            ChildEvent::Line { source, text } => {
                tracing::debug!(robot = %kind, ?source, "{text}");
                status
                    .update(|current| {
                        if current.run_id != Some(run_id) {
                            // A reset or a newer run superseded us.
                            return;
                        }
                        if current.state == RunState::Running {
                            classify::apply_chunk(current, &text);
                        } else {
                            // Late output after Stopped: keep it visible in
                            // the tail, leave structured fields frozen.
                            current.push_log(classify::entry_for(&text));
                        }
                    })
                    .await;
            }
            ChildEvent::Exited { code } => {
                status
                    .update(|current| {
                        if current.run_id != Some(run_id) {
                            return;
                        }
                        if current.state == RunState::Running {
                            if code == Some(0) {
                                current.state = RunState::Completed;
                            } else {
                                current.state = RunState::Failed;
                                current.error = Some(match code {
                                    Some(code) => format!("robot exited with code {code}"),
                                    None => "robot terminated by signal".to_string(),
                                });
                            }
                            current.finished_at = Some(Utc::now());
                        }
                    })
                    .await;

                let mut slot = tracked.lock().await;
                if slot.as_ref().map(|t| t.run_id) == Some(run_id) {
                    *slot = None;
                }
                tracing::info!(robot = %kind, %run_id, ?code, "robot exited");
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::warn!(pid, "failed to signal robot process: {err}");
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) {
    tracing::warn!(pid, "graceful termination is not supported on this platform");
}
