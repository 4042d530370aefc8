//! Command channel to the remote test executor

use async_trait::async_trait;
use serde_json::Value;

use testrun_core::{CommandResponse, TestCommand};

use crate::error::Result;

/// Request/response channel to the remote executor.
///
/// Implementations apply their own low-level retry. Calls must be safe to
/// issue concurrently, and each call either fully succeeds or fully fails.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Send a raw command by name
    async fn send_command(&self, command: &str, params: Value) -> Result<CommandResponse>;

    /// Send a typed command
    async fn send(&self, command: &TestCommand) -> Result<CommandResponse> {
        let params = command.params()?;
        self.send_command(command.name(), params).await
    }
}
