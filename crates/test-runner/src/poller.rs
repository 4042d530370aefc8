//! Run completion poller
//!
//! Drives a submitted run to a terminal outcome by polling the executor:
//!
//! ```text
//! SUBMITTED -> POLLING --(terminal state)--> fetch result --> Completed
//!                  |  \--(run not tracked)--> fetch result --> Completed
//!                  |                              \--(fails)--> keep polling
//!                  \--(deadline elapsed)--> TimedOut
//! ```
//!
//! Transport failures on status queries are transient and only end the wait
//! through the deadline. Each transport call is itself bounded by that
//! deadline. The loop awaits on every transport call and on the
//! sleep between polls, so dropping the future cancels it at the next
//! suspension point.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use testrun_core::{CommandResponse, RunResult, RunSnapshot, TestCommand};

use crate::config::PollerConfig;
use crate::error::Result;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::transport::CommandTransport;

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Terminal state reached; the detailed result, or the last snapshot if
    /// detail was unavailable
    Completed(RunResult),
    /// Deadline elapsed before a terminal state was observed
    TimedOut {
        run_id: String,
        timeout: Duration,
        last_snapshot: Option<RunSnapshot>,
    },
    /// Transport failed while fetching the result of a finished run
    FetchFailed { run_id: String, reason: String },
}

/// Emits at most once per interval; the first call always fires
struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Polls run status until completion or timeout
#[derive(Clone)]
pub struct RunPoller {
    transport: Arc<dyn CommandTransport>,
    progress: Arc<dyn ProgressSink>,
    config: PollerConfig,
}

impl RunPoller {
    pub fn new(
        transport: Arc<dyn CommandTransport>,
        progress: Arc<dyn ProgressSink>,
        config: PollerConfig,
    ) -> Self {
        Self {
            transport,
            progress,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Wait for `run_id` to reach a terminal state.
    ///
    /// Every transport call is bounded by the same deadline, so a remote side
    /// that stops answering cannot hold the wait past `timeout`.
    pub async fn wait_for_completion(&self, run_id: &str, timeout: Duration) -> RunOutcome {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut last_snapshot: Option<RunSnapshot> = None;
        let mut throttle = Throttle::new(self.config.progress_interval);

        info!("Waiting up to {}s for run {}", timeout.as_secs(), run_id);

        loop {
            let status = self.query(TestCommand::Status { run_id: run_id.to_string() });
            let Ok(status) = timeout_at(deadline, status).await else {
                warn!("Status query for run {} still pending at the deadline", run_id);
                return timed_out(run_id, timeout, last_snapshot);
            };

            match status {
                Ok(response) if response.success => {
                    let snapshot = parse_snapshot(response.data);
                    debug!("Run {} state: {}", run_id, snapshot.state_or("pending"));
                    if snapshot.is_terminal() {
                        return self.fetch_final_result(run_id, snapshot, deadline).await;
                    }
                    last_snapshot = Some(snapshot);
                }
                Ok(response) if response.indicates_run_gone() => {
                    debug!("Run {} no longer tracked: {}", run_id, response.error_text());
                    match timeout_at(deadline, self.fetch_untracked_result(run_id)).await {
                        Ok(Some(result)) => return RunOutcome::Completed(result),
                        Ok(None) => {}
                        Err(_) => return timed_out(run_id, timeout, last_snapshot),
                    }
                }
                Ok(response) => {
                    debug!("Status query for run {} rejected: {}", run_id, response.error_text());
                }
                Err(e) => {
                    if throttle.ready() {
                        warn!("Run {} status unavailable: {}", run_id, e);
                        self.progress
                            .notify(ProgressEvent::status_unavailable(run_id, e.to_string()));
                    }
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return timed_out(run_id, timeout, last_snapshot);
            }

            if throttle.ready() {
                let state = last_snapshot
                    .as_ref()
                    .map(|s| s.state_or("pending"))
                    .unwrap_or("pending");
                self.progress
                    .notify(ProgressEvent::waiting(run_id, elapsed, state));
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Terminal state seen: fetch detail once, degrading to the snapshot.
    ///
    /// The fetch gets at least one poll interval even when the terminal state
    /// arrived right at the deadline.
    async fn fetch_final_result(
        &self,
        run_id: &str,
        snapshot: RunSnapshot,
        deadline: Instant,
    ) -> RunOutcome {
        let deadline = deadline.max(Instant::now() + self.config.poll_interval);
        let query = self.query(TestCommand::Result { run_id: run_id.to_string() });
        let Ok(reply) = timeout_at(deadline, query).await else {
            error!("Result query for run {} did not answer in time", run_id);
            return RunOutcome::FetchFailed {
                run_id: run_id.to_string(),
                reason: "Result query did not answer before the wait deadline".to_string(),
            };
        };

        match reply {
            Ok(response) if response.success => match parse_result(response.data) {
                Some(mut result) => {
                    if result.state.is_none() {
                        result.state = snapshot.state.clone();
                    }
                    info!(
                        "Run {} finished: {}",
                        run_id,
                        result.state.as_deref().unwrap_or("unknown")
                    );
                    RunOutcome::Completed(result)
                }
                None => {
                    warn!("Malformed result for run {}; using last status", run_id);
                    RunOutcome::Completed(snapshot.into_summary_result(run_id))
                }
            },
            Ok(response) => {
                warn!(
                    "Result query for run {} rejected ({}); using last status",
                    run_id,
                    response.error_text()
                );
                RunOutcome::Completed(snapshot.into_summary_result(run_id))
            }
            Err(e) => {
                error!("Failed to fetch result for run {}: {}", run_id, e);
                RunOutcome::FetchFailed {
                    run_id: run_id.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Executor dropped the run: try once to read its final result
    async fn fetch_untracked_result(&self, run_id: &str) -> Option<RunResult> {
        match self.query(TestCommand::Result { run_id: run_id.to_string() }).await {
            Ok(response) if response.success => parse_result(response.data),
            Ok(response) => {
                debug!("No result for untracked run {}: {}", run_id, response.error_text());
                None
            }
            Err(e) => {
                debug!("Result query for untracked run {} failed: {}", run_id, e);
                None
            }
        }
    }

    async fn query(&self, command: TestCommand) -> Result<CommandResponse> {
        self.transport.send(&command).await
    }
}

fn timed_out(run_id: &str, timeout: Duration, last_snapshot: Option<RunSnapshot>) -> RunOutcome {
    warn!("Run {} did not finish within {}s", run_id, timeout.as_secs());
    RunOutcome::TimedOut {
        run_id: run_id.to_string(),
        timeout,
        last_snapshot,
    }
}

fn parse_snapshot(data: Option<Value>) -> RunSnapshot {
    data.and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Missing data reads as an empty result; data of the wrong shape is malformed
fn parse_result(data: Option<Value>) -> Option<RunResult> {
    match data {
        None | Some(Value::Null) => Some(RunResult::default()),
        Some(value) => serde_json::from_value(value).ok(),
    }
}
