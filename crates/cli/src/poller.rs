//! Terminal status poller for the companion facade.
//!
//! Mirrors the dashboard's control loop: start a robot, then poll the
//! status endpoint every two seconds until the run reaches a terminal
//! state. Ctrl-C performs the manual stop: the stop endpoint is called
//! and local polling halts immediately, without waiting for the server to
//! confirm termination.

use colored::Colorize;
use reqwest::{Client, Response, Url};
use rk_protocol::{ErrorResponse, RobotKind, RunState, StatusResponse};
use std::time::Duration;
use thiserror::Error;

/// Fixed poll cadence, matching the dashboard.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Errors from the poller client.
#[derive(Error, Debug)]
pub enum PollerError {
    /// The automation facade only exists on the local machine; remote
    /// deployments never reach it.
    #[error("the companion server is only reachable locally, refusing {0}")]
    NotLocal(String),

    /// A poll loop is already active on this poller.
    #[error("a poll loop is already active")]
    PollInProgress,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The facade answered with an error body.
    #[error("{0}")]
    Server(String),
}

/// Client-side control loop over the companion facade.
#[derive(Debug)]
pub struct StatusPoller {
    client: Client,
    base: String,
    active: bool,
}

impl StatusPoller {
    /// Create a poller for `base`, which must point at loopback.
    pub fn new(base: impl Into<String>) -> Result<Self, PollerError> {
        let base = base.into().trim_end_matches('/').to_string();
        if !is_local(&base) {
            return Err(PollerError::NotLocal(base));
        }
        Ok(Self {
            client: Client::new(),
            base,
            active: false,
        })
    }

    /// Start `kind` and follow it to a terminal state.
    ///
    /// Refuses to run while another loop is active on this poller.
    pub async fn run(&mut self, kind: RobotKind) -> Result<RunState, PollerError> {
        if self.active {
            return Err(PollerError::PollInProgress);
        }
        self.active = true;
        let result = self.follow(kind).await;
        self.active = false;
        result
    }

    async fn follow(&self, kind: RobotKind) -> Result<RunState, PollerError> {
        self.start(kind).await?;
        println!("robot {} started", kind.as_str().bold());

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    if let Err(err) = self.stop().await {
                        eprintln!("stop request failed: {err}");
                    }
                    println!("{}", "run stopped".yellow());
                    return Ok(RunState::Stopped);
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    let status = self.status().await?;
                    render(&status);
                    match status.run.state {
                        RunState::Completed => {
                            println!("{}", "robot finished successfully".green());
                            return Ok(RunState::Completed);
                        }
                        RunState::Failed => {
                            let detail = status.run.error.unwrap_or_default();
                            println!("{}", format!("robot failed: {detail}").red());
                            return Ok(RunState::Failed);
                        }
                        RunState::Stopped => {
                            println!("{}", "run stopped".yellow());
                            return Ok(RunState::Stopped);
                        }
                        RunState::Idle | RunState::Running => {}
                    }
                }
            }
        }
    }

    async fn start(&self, kind: RobotKind) -> Result<(), PollerError> {
        let response = self
            .client
            .post(format!("{}/api/robot/{kind}", self.base))
            .send()
            .await?;
        expect_ok(response).await.map(|_| ())
    }

    /// One-shot stop request.
    pub async fn stop(&self) -> Result<(), PollerError> {
        let response = self
            .client
            .post(format!("{}/api/robot/stop", self.base))
            .send()
            .await?;
        expect_ok(response).await.map(|_| ())
    }

    /// One-shot reset request.
    pub async fn reset(&self) -> Result<(), PollerError> {
        let response = self
            .client
            .post(format!("{}/api/robot/reset", self.base))
            .send()
            .await?;
        expect_ok(response).await.map(|_| ())
    }

    /// Fetch the current status once.
    pub async fn status(&self) -> Result<StatusResponse, PollerError> {
        let response = self
            .client
            .get(format!("{}/api/robot/status", self.base))
            .send()
            .await?;
        let response = expect_ok(response).await?;
        Ok(response.json().await?)
    }
}

async fn expect_ok(response: Response) -> Result<Response, PollerError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => "unexpected server error".to_string(),
    };
    Err(PollerError::Server(message))
}

fn is_local(base: &str) -> bool {
    Url::parse(base)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| host == "localhost" || host == "127.0.0.1")
        .unwrap_or(false)
}

fn render(status: &StatusResponse) {
    let run = &status.run;
    let progress = if run.total > 0 {
        format!(
            "{}/{} ({}%)",
            run.processed,
            run.total,
            run.processed * 100 / run.total
        )
    } else {
        format!("{} processed", run.processed)
    };
    let phase = run.message.as_deref().unwrap_or("working");
    match run.current.as_deref() {
        Some(current) => println!("{} {phase} - {current}", progress.as_str().bold()),
        None => println!("{} {phase}", progress.as_str().bold()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_loopback_urls() {
        assert!(StatusPoller::new("http://127.0.0.1:3001").is_ok());
        assert!(StatusPoller::new("http://localhost:3001/").is_ok());
    }

    #[test]
    fn test_rejects_remote_urls() {
        let err = StatusPoller::new("http://dashboard.example.com").expect_err("must reject");
        assert!(matches!(err, PollerError::NotLocal(_)));
    }

    #[test]
    fn test_rejects_garbage_urls() {
        assert!(StatusPoller::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_second_loop_is_refused() {
        let mut poller = StatusPoller::new("http://127.0.0.1:3001").expect("poller");
        poller.active = true;
        let err = poller.run(RobotKind::Stf).await.expect_err("must refuse");
        assert!(matches!(err, PollerError::PollInProgress));
    }
}
