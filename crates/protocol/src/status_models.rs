//! Runtime status models for a tracked automation run.
//!
//! This module defines the structures for tracking the single automation
//! process the companion server may be running at any given time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

/// Maximum number of output lines retained in [`RunStatus::log_tail`].
///
/// Older lines are discarded first; the dashboard only renders a short
/// scrollback, so a bounded tail keeps the polled payload small.
pub const LOG_TAIL_LIMIT: usize = 50;

/// Represents the current lifecycle state of the tracked automation run.
///
/// The state progresses through these values during normal execution:
/// Idle -> Running -> Completed
///
/// Special states:
/// - Failed: the child exited nonzero or could not be spawned
/// - Stopped: the user requested termination; recorded immediately, without
///   waiting for the OS to confirm the child is gone
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No automation is tracked.
    #[default]
    Idle,

    /// An automation child process is being tracked.
    Running,

    /// The child exited with a success code.
    Completed,

    /// The child exited with a failure code, or never spawned.
    Failed,

    /// The user stopped the run before the child exited.
    Stopped,
}

impl RunState {
    /// Whether this state ends a run (no further transitions except reset).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

/// Which automation bundle to invoke.
///
/// A closed set: each variant corresponds to one on-disk script bundle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
pub enum RobotKind {
    /// Supreme court (STF) scraping automation.
    Stf,
    /// Superior court (STJ) scraping automation.
    Stj,
}

impl RobotKind {
    /// All known kinds, in a fixed order.
    pub const ALL: [RobotKind; 2] = [RobotKind::Stf, RobotKind::Stj];

    /// The lowercase wire identifier, as used in URLs and JSON bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stf => "stf",
            Self::Stj => "stj",
        }
    }
}

impl fmt::Display for RobotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotKind {
    type Err = UnknownRobotKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stf" => Ok(Self::Stf),
            "stj" => Ok(Self::Stj),
            other => Err(UnknownRobotKind(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized robot identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRobotKind(pub String);

impl fmt::Display for UnknownRobotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown robot kind: {}", self.0)
    }
}

impl std::error::Error for UnknownRobotKind {}

/// Severity of a captured output line.
///
/// Lines are `Error` only when they carry an explicit severity marker;
/// everything else is informational, even when delivered on stderr, since
/// the automation frameworks route ordinary logs there.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// One captured line of child output, with its classified severity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
}

impl LogEntry {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            text: text.into(),
        }
    }
}

/// The single shared status record for the tracked automation run.
///
/// There is exactly one of these per companion server; it is overwritten
/// wholesale at the start of a new run and on reset, and it is never
/// persisted; a server restart discards all history.
#[derive(Serialize, Deserialize, Debug, Clone, Default, TS)]
pub struct RunStatus {
    /// Current lifecycle state.
    pub state: RunState,

    /// Which automation was launched; `None` when Idle.
    pub robot: Option<RobotKind>,

    /// Unique identifier for this run, assigned at spawn time.
    pub run_id: Option<Uuid>,

    /// Units of work finished so far, as reported by the child's output.
    ///
    /// Monotonically non-decreasing within a single run.
    pub processed: u32,

    /// Total units of work; 0 until discovered from output.
    pub total: u32,

    /// Free-text label of the unit currently being processed.
    pub current: Option<String>,

    /// Human-readable phase message derived from output heuristics.
    pub message: Option<String>,

    /// Most recent output lines (bounded by [`LOG_TAIL_LIMIT`]).
    pub log_tail: Vec<LogEntry>,

    /// When the child was spawned.
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,

    /// Failure detail for Failed runs (spawn or exit diagnostics).
    pub error: Option<String>,
}

impl RunStatus {
    /// The Idle record all fields reset to.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Text of the most recent log line, if any.
    pub fn last_log_line(&self) -> Option<&str> {
        self.log_tail.last().map(|entry| entry.text.as_str())
    }

    /// Append a line to the tail, dropping the oldest once over the cap.
    pub fn push_log(&mut self, entry: LogEntry) {
        self.log_tail.push(entry);
        if self.log_tail.len() > LOG_TAIL_LIMIT {
            let excess = self.log_tail.len() - LOG_TAIL_LIMIT;
            self.log_tail.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_serializes_lowercase() {
        let json = serde_json::to_string(&RunState::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let json = serde_json::to_string(&RunState::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
    }

    #[test]
    fn robot_kind_round_trips_through_str() {
        for kind in RobotKind::ALL {
            assert_eq!(kind.as_str().parse::<RobotKind>().unwrap(), kind);
        }
        assert!("trf".parse::<RobotKind>().is_err());
    }

    #[test]
    fn robot_kind_parse_is_case_insensitive() {
        assert_eq!("STF".parse::<RobotKind>().unwrap(), RobotKind::Stf);
    }

    #[test]
    fn idle_status_has_empty_fields() {
        let status = RunStatus::idle();
        assert_eq!(status.state, RunState::Idle);
        assert!(status.robot.is_none());
        assert_eq!(status.processed, 0);
        assert_eq!(status.total, 0);
        assert!(status.log_tail.is_empty());
    }

    #[test]
    fn push_log_caps_the_tail() {
        let mut status = RunStatus::idle();
        for i in 0..LOG_TAIL_LIMIT + 10 {
            status.push_log(LogEntry::info(format!("line {i}")));
        }
        assert_eq!(status.log_tail.len(), LOG_TAIL_LIMIT);
        assert_eq!(status.log_tail[0].text, "line 10");
        assert_eq!(status.last_log_line(), Some("line 59"));
    }

    #[test]
    fn terminal_states() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Stopped.is_terminal());
    }
}
