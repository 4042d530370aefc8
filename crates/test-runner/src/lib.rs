//! Test Runner - Remote test execution with client-side completion waiting
//!
//! Submits list/run/rerun commands to a remote test executor, then polls the
//! run until it reaches a terminal state, the caller's timeout elapses, or
//! the final result cannot be retrieved.

mod client;
mod config;
mod error;
mod orchestrator;
mod poller;
mod progress;
mod transport;

#[cfg(test)]
mod testing;

pub use client::HttpTransport;
pub use config::{PollerConfig, RetryConfig};
pub use error::{Result, RunnerError};
pub use orchestrator::TestOrchestrator;
pub use poller::{RunOutcome, RunPoller};
pub use progress::{ChannelProgress, ProgressEvent, ProgressKind, ProgressSink, TracingProgress};
pub use transport::CommandTransport;
