//! Progress notifications emitted while waiting on a run
//!
//! These are observability only; callers never depend on them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// What the poller is reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    /// Run is still going
    Waiting { elapsed_secs: f64, state: String },
    /// A status query failed; polling continues
    StatusUnavailable { reason: String },
}

/// Progress event with metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub run_id: String,
    #[serde(flatten)]
    pub kind: ProgressKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn waiting(run_id: &str, elapsed: Duration, state: &str) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        Self {
            run_id: run_id.to_string(),
            message: format!("Run '{}' still {} after {:.1}s...", run_id, state, elapsed_secs),
            kind: ProgressKind::Waiting {
                elapsed_secs,
                state: state.to_string(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn status_unavailable(run_id: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            run_id: run_id.to_string(),
            message: format!("Run '{}' status unavailable ({}); retrying...", run_id, reason),
            kind: ProgressKind::StatusUnavailable { reason },
            timestamp: Utc::now(),
        }
    }
}

/// Side channel for progress notifications
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

/// Writes progress to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify(&self, event: ProgressEvent) {
        info!(run_id = %event.run_id, "{}", event.message);
    }
}

/// Forwards progress over a bounded channel.
///
/// Never blocks the poller: when the receiver lags, events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn notify(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("Dropping progress event: {}", e);
        }
    }
}
