//! Facade endpoint handlers.

use crate::sanitize::sanitize_json_payload;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rk_core::requirements;
use rk_core::runner::RunnerError;
use rk_protocol::{
    AckResponse, ErrorResponse, HealthResponse, InstallRequest, RobotKind, StartResponse,
    StatusResponse,
};

/// `GET /health`: liveness plus a timestamp.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::now())
}

/// `POST /api/robot/{kind}`: launch an automation.
pub async fn start_robot_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Response {
    let kind: RobotKind = match kind.parse() {
        Ok(kind) => kind,
        Err(err) => return error_body(StatusCode::BAD_REQUEST, err.to_string()),
    };

    match state.runner.start(kind).await {
        Ok(_) => Json(StartResponse::started(kind)).into_response(),
        Err(err) => runner_error(err),
    }
}

/// `GET /api/robot/status`: the polled status record, with the most
/// recent log line pulled out for convenience.
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::from(state.status.snapshot().await))
}

/// `POST /api/robot/reset`: back to the Idle record, forgetting any
/// tracked process reference.
pub async fn reset_handler(State(state): State<AppState>) -> Json<AckResponse> {
    state.runner.reset().await;
    Json(AckResponse::ok())
}

/// `POST /api/robot/stop`: terminate the tracked run.
pub async fn stop_handler(State(state): State<AppState>) -> Response {
    match state.runner.stop().await {
        Ok(()) => Json(AckResponse::stopped()).into_response(),
        Err(err) => runner_error(err),
    }
}

/// `GET /api/robot/check-requirements`: side-effect-free probe of the
/// local Python environment.
pub async fn check_requirements_handler(State(state): State<AppState>) -> Response {
    let report = requirements::check(&state.python, &state.bundles).await;
    Json(report).into_response()
}

/// `POST /api/robot/install-requirements`: install the packages for one
/// bundle or all of them. Blocks until pip finishes.
///
/// The raw body passes through the control-character sanitizer first, so
/// payloads assembled by shell pipelines with stray newlines still parse.
pub async fn install_requirements_handler(State(state): State<AppState>, body: String) -> Response {
    let cleaned = sanitize_json_payload(&body);
    let request: InstallRequest = match serde_json::from_str(&cleaned) {
        Ok(request) => request,
        Err(err) => {
            return error_body(StatusCode::BAD_REQUEST, format!("invalid JSON body: {err}"));
        }
    };

    for kind in request.robot.kinds() {
        let Some(bundle) = state.bundles.get(kind) else {
            return error_body(
                StatusCode::BAD_REQUEST,
                format!("no bundle registered for robot {kind}"),
            );
        };
        if let Err(err) = requirements::install(&state.python, bundle).await {
            tracing::error!(robot = %kind, "requirements install failed: {err}");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    }

    Json(AckResponse::ok()).into_response()
}

fn runner_error(err: RunnerError) -> Response {
    let code = match err {
        RunnerError::AlreadyRunning => StatusCode::CONFLICT,
        RunnerError::NoActiveProcess
        | RunnerError::UnknownRobot(_)
        | RunnerError::BundleMissing { .. } => StatusCode::BAD_REQUEST,
        RunnerError::Spawn { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(code, err.to_string())
}

fn error_body(code: StatusCode, message: String) -> Response {
    (code, Json(ErrorResponse::new(message))).into_response()
}
