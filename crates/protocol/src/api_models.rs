//! Request and response bodies for the local HTTP facade.
//!
//! These mirror what the browser dashboard exchanges with the companion
//! server. All responses are plain JSON objects; errors are always
//! `{"error": <message>}` with an HTTP error status.

use crate::status_models::{RobotKind, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

/// `GET /health`: liveness probe.
///
/// The client uses this to decide whether automation features should be
/// offered at all, independently of whether a run is active.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn now() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// `POST /api/robot/{kind}`: acknowledgment that a robot was launched.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StartResponse {
    pub status: String,
    pub robot: RobotKind,
}

impl StartResponse {
    pub fn started(robot: RobotKind) -> Self {
        Self {
            status: "started".to_string(),
            robot,
        }
    }
}

/// `GET /api/robot/status`: the shared status record, augmented with the
/// single most recent log line for convenient display.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub run: RunStatus,

    /// Text of the most recent captured output line.
    pub log: Option<String>,
}

impl From<RunStatus> for StatusResponse {
    fn from(run: RunStatus) -> Self {
        let log = run.last_log_line().map(str::to_string);
        Self { run, log }
    }
}

/// Plain acknowledgment used by `POST /api/robot/reset` (`"ok"`),
/// `POST /api/robot/stop` (`"stopped"`) and the install endpoint (`"ok"`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AckResponse {
    pub status: String,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    pub fn stopped() -> Self {
        Self {
            status: "stopped".to_string(),
        }
    }
}

/// Error body carried by every non-2xx facade response.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// `GET /api/robot/check-requirements`: which required Python packages are
/// present in the local environment. Side-effect free.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RequirementsReport {
    /// True when every required package is installed.
    pub installed: bool,

    /// Per-package presence, keyed by distribution name.
    pub packages: BTreeMap<String, bool>,

    /// Names of the packages that are absent.
    pub missing: Vec<String>,
}

/// Which bundle(s) an install request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum InstallTarget {
    Stf,
    Stj,
    All,
}

impl InstallTarget {
    /// The kinds this target expands to.
    pub fn kinds(self) -> Vec<RobotKind> {
        match self {
            Self::Stf => vec![RobotKind::Stf],
            Self::Stj => vec![RobotKind::Stj],
            Self::All => RobotKind::ALL.to_vec(),
        }
    }
}

/// `POST /api/robot/install-requirements` request body.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct InstallRequest {
    pub robot: InstallTarget,
}
