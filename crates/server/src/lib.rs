//! # rk-server
//!
//! The local-only HTTP facade over the robot runner and status store.
//!
//! Every endpoint speaks JSON; every failure becomes an HTTP error status
//! with an `{"error": <message>}` body, and no error crashes the server.
//! The facade never initiates state transitions itself; it only reads the
//! status store or delegates to the runner.

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use rk_core::bundles::BundleSet;
use rk_core::runner::RobotRunner;
use rk_core::status::StatusStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub mod handlers;
pub mod sanitize;

/// Shared context handed to every handler.
///
/// An explicit object owned by the server setup (never a module-level
/// global) so independent test instances can run side by side.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<RobotRunner>,
    pub status: Arc<StatusStore>,
    pub bundles: Arc<BundleSet>,
    pub python: PathBuf,
}

impl AppState {
    pub fn new(bundles: Arc<BundleSet>, python: PathBuf) -> Self {
        let status = Arc::new(StatusStore::new());
        let runner = Arc::new(RobotRunner::new(Arc::clone(&bundles), Arc::clone(&status)));
        Self {
            runner,
            status,
            bundles,
            python,
        }
    }
}

/// Build the facade router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/robot/status", get(handlers::status_handler))
        .route("/api/robot/reset", post(handlers::reset_handler))
        .route("/api/robot/stop", post(handlers::stop_handler))
        .route(
            "/api/robot/check-requirements",
            get(handlers::check_requirements_handler),
        )
        .route(
            "/api/robot/install-requirements",
            post(handlers::install_requirements_handler),
        )
        .route("/api/robot/:kind", post(handlers::start_robot_handler))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("companion server listening on http://{addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Permissive CORS for the dashboard dev server.
///
/// The facade only ever binds to loopback, so a wildcard origin exposes
/// nothing beyond the local machine.
async fn cors_middleware(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;

    let mut response = if preflight {
        Response::new(axum::body::Body::empty())
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    if preflight {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
