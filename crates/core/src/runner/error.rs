//! Error types for the robot runner.

use rk_protocol::RobotKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by runner lifecycle operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// A start was requested while a process is already tracked. The
    /// request is rejected, never queued.
    #[error("a robot is already running")]
    AlreadyRunning,

    /// A stop was requested with nothing tracked.
    #[error("no robot is running")]
    NoActiveProcess,

    /// The requested kind has no registered bundle.
    #[error("no bundle registered for robot {0}")]
    UnknownRobot(RobotKind),

    /// The bundle directory does not exist on disk.
    #[error("bundle directory not found: {path}")]
    BundleMissing { path: PathBuf },

    /// The underlying OS invocation failed (e.g. missing interpreter).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// Type alias for Result with RunnerError.
pub type RunnerResult<T> = Result<T, RunnerError>;
