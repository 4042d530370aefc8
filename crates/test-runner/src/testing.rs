//! Scripted transport and progress recorder for unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use testrun_core::CommandResponse;

use crate::error::{Result, RunnerError};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::transport::CommandTransport;

/// One scripted reply
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// Transport-level success carrying this envelope
    Envelope(Value),
    /// Transport-level failure
    Fail(String),
    /// Never answers
    Hang,
}

impl Reply {
    pub(crate) fn ok(data: Value) -> Self {
        Self::Envelope(json!({"success": true, "data": data}))
    }

    pub(crate) fn rejected(error: &str) -> Self {
        Self::Envelope(json!({"success": false, "error": error}))
    }

    pub(crate) fn state(state: &str) -> Self {
        Self::ok(json!({"runId": "r1", "state": state}))
    }
}

type Handler = Box<dyn Fn(usize, &Value) -> Reply + Send + Sync>;

/// Transport that answers each command from a script.
///
/// A handler receives the zero-based call index for its command plus the
/// params. Commands without a handler fail at the transport level.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    handlers: HashMap<String, Handler>,
    counts: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn handler(
        mut self,
        command: &str,
        handler: impl Fn(usize, &Value) -> Reply + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(command.to_string(), Box::new(handler));
        self
    }

    /// Replies in order; the last one repeats forever
    pub(crate) fn script(self, command: &str, replies: Vec<Reply>) -> Self {
        self.handler(command, move |index, _| {
            let last = replies.len().saturating_sub(1);
            replies[index.min(last)].clone()
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|(name, _)| name == command).count()
    }
}

#[async_trait]
impl CommandTransport for ScriptedTransport {
    async fn send_command(&self, command: &str, params: Value) -> Result<CommandResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), params.clone()));

        let index = {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(command.to_string()).or_insert(0);
            let index = *count;
            *count += 1;
            index
        };

        let handler = self
            .handlers
            .get(command)
            .ok_or_else(|| RunnerError::transport(format!("no script for {}", command)))?;

        match handler(index, &params) {
            Reply::Envelope(value) => serde_json::from_value(value)
                .map_err(|e| RunnerError::InvalidResponse { message: e.to_string() }),
            Reply::Fail(message) => Err(RunnerError::connection(message)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Collects every progress event
#[derive(Default)]
pub(crate) struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub(crate) fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn notify(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
