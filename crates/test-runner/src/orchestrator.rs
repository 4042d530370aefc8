//! Test run orchestration
//!
//! Public entry points: build the command, submit it, optionally wait for
//! the run on this side, and fold every outcome into a `ResponseEnvelope`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use testrun_core::{
    CommandResponse, ListTestsArgs, RerunFailedArgs, ResponseEnvelope, RunResult, RunTestsArgs,
    TestCommand,
};

use crate::config::PollerConfig;
use crate::poller::{RunOutcome, RunPoller};
use crate::progress::ProgressSink;
use crate::transport::CommandTransport;

/// Which submission a wait belongs to; only affects wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Tests,
    FailedRerun,
}

impl RunKind {
    fn still_running(&self, run_id: &str, timeout: Duration) -> String {
        match self {
            Self::Tests => format!(
                "Test run '{}' is still running after {} seconds.",
                run_id,
                timeout.as_secs()
            ),
            Self::FailedRerun => format!(
                "Failed-test rerun '{}' is still running after {} seconds.",
                run_id,
                timeout.as_secs()
            ),
        }
    }

    fn fetch_failed(&self, run_id: &str, reason: &str) -> String {
        match self {
            Self::Tests => format!(
                "Failed to retrieve final results for run '{}': {}",
                run_id, reason
            ),
            Self::FailedRerun => {
                format!("Failed to retrieve rerun results for '{}': {}", run_id, reason)
            }
        }
    }
}

/// Front door for listing, running and rerunning tests
#[derive(Clone)]
pub struct TestOrchestrator {
    transport: Arc<dyn CommandTransport>,
    poller: RunPoller,
}

impl TestOrchestrator {
    pub fn new(
        transport: Arc<dyn CommandTransport>,
        progress: Arc<dyn ProgressSink>,
        config: PollerConfig,
    ) -> Self {
        let poller = RunPoller::new(Arc::clone(&transport), progress, config);
        Self { transport, poller }
    }

    pub fn poller(&self) -> &RunPoller {
        &self.poller
    }

    /// List tests, optionally filtered by mode
    pub async fn list_tests(&self, args: &ListTestsArgs) -> ResponseEnvelope<Value> {
        let command = TestCommand::List(args.to_request());
        match self.submit(&command).await {
            Ok(response) => response,
            Err(envelope) => envelope,
        }
    }

    /// Start a test run and, unless told not to, wait for it to finish
    pub async fn run_tests(&self, args: &RunTestsArgs) -> ResponseEnvelope<RunResult> {
        let command = TestCommand::Run(args.to_request());
        self.submit_and_wait(
            RunKind::Tests,
            command,
            args.wait_for_completion(),
            args.timeout_seconds(),
            None,
        )
        .await
    }

    /// Rerun the failed tests of a previous run
    pub async fn rerun_failed_tests(&self, args: &RerunFailedArgs) -> ResponseEnvelope<RunResult> {
        let command = TestCommand::RerunFailed(args.to_request());
        self.submit_and_wait(
            RunKind::FailedRerun,
            command,
            args.wait_for_completion(),
            args.timeout_seconds(),
            args.run_id(),
        )
        .await
    }

    async fn submit_and_wait(
        &self,
        kind: RunKind,
        command: TestCommand,
        wait: bool,
        timeout_seconds: Option<u64>,
        requested_run_id: Option<String>,
    ) -> ResponseEnvelope<RunResult> {
        let response = match self.submit(&command).await {
            Ok(response) => response,
            Err(envelope) => return envelope.into_typed(),
        };

        if !wait {
            return response.into_typed();
        }

        let Some(run_id) = response.data_text("runId").or(requested_run_id) else {
            return response.into_typed();
        };

        let timeout = timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.poller.config().default_timeout);

        match self.poller.wait_for_completion(&run_id, timeout).await {
            RunOutcome::Completed(result) => {
                let message = result.summary_message(&run_id);
                info!("{}", message);
                ResponseEnvelope::ok(message, Some(result))
            }
            RunOutcome::TimedOut {
                timeout,
                last_snapshot,
                ..
            } => {
                let message = kind.still_running(&run_id, timeout);
                let data = last_snapshot
                    .map(|snapshot| snapshot.into_result())
                    .unwrap_or_else(|| RunResult::unknown(&run_id));
                ResponseEnvelope::failure(message.clone(), message, Some(data))
            }
            RunOutcome::FetchFailed { reason, .. } => {
                let message = kind.fetch_failed(&run_id, &reason);
                let data = RunResult {
                    run_id: Some(run_id.clone()),
                    ..Default::default()
                };
                ResponseEnvelope::failure(message, reason, Some(data))
            }
        }
    }

    /// Send a command; a transport failure becomes a failure envelope
    async fn submit(&self, command: &TestCommand) -> Result<CommandResponse, CommandResponse> {
        match self.transport.send(command).await {
            Ok(response) => {
                if !response.success {
                    warn!("{} rejected: {}", command.name(), response.error_text());
                }
                Ok(response)
            }
            Err(e) => {
                error!("Failed to send {}: {}", command.name(), e);
                Err(ResponseEnvelope::failure(
                    format!("Failed to send {}: {}", command.name(), e),
                    e.to_string(),
                    None,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use testrun_core::request::{
        GET_TEST_RUN_RESULT, GET_TEST_RUN_STATUS, LIST_TESTS, RERUN_FAILED_TESTS, RUN_TESTS,
    };

    use crate::testing::{RecordingProgress, Reply, ScriptedTransport};

    fn orchestrator(transport: &Arc<ScriptedTransport>) -> TestOrchestrator {
        TestOrchestrator::new(
            Arc::clone(transport) as Arc<dyn CommandTransport>,
            Arc::new(RecordingProgress::default()),
            PollerConfig::default(),
        )
    }

    fn started(run_id: &str) -> Reply {
        Reply::Envelope(json!({
            "success": true,
            "message": "Test run started",
            "data": {"runId": run_id, "state": "running"}
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tests_end_to_end() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RUN_TESTS, vec![started("r1")])
                .script(
                    GET_TEST_RUN_STATUS,
                    vec![Reply::state("running"), Reply::state("completed")],
                )
                .script(
                    GET_TEST_RUN_RESULT,
                    vec![Reply::ok(json!({
                        "runId": "r1",
                        "mode": "PlayMode",
                        "summary": {"total": 1, "passed": 1, "failed": 0, "skipped": 0,
                                    "durationSeconds": 0.2, "resultState": "Passed"},
                        "results": [{"name": "Bar", "fullName": "Foo.Bar", "state": "Passed",
                                     "durationSeconds": 0.2}]
                    }))],
                ),
        );
        let orchestrator = orchestrator(&transport);

        let args: RunTestsArgs = serde_json::from_value(json!({
            "mode": "PlayMode",
            "test_names": "Foo.Bar",
            "wait_for_completion": true,
            "timeout_seconds": 5
        }))
        .unwrap();
        let envelope = orchestrator.run_tests(&args).await;

        assert!(envelope.success);
        let message = envelope.message.unwrap();
        assert!(message.contains("1/1 passed, 0 failed, 0 skipped"), "{message}");
        assert_eq!(
            message,
            "Run 'r1' finished with state Passed: 1/1 passed, 0 failed, 0 skipped."
        );
        let data = envelope.data.unwrap();
        assert_eq!(data.state.as_deref(), Some("completed"));
        assert_eq!(data.results.unwrap()[0].full_name, "Foo.Bar");

        let calls = transport.calls();
        assert_eq!(calls[0].0, RUN_TESTS);
        assert_eq!(
            calls[0].1,
            json!({
                "mode": "PlayMode",
                "timeoutSeconds": 5,
                "waitForCompletion": false,
                "testNames": ["Foo.Bar"]
            })
        );
        assert_eq!(transport.count(GET_TEST_RUN_STATUS), 2);
        assert_eq!(transport.count(GET_TEST_RUN_RESULT), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tests_without_wait_returns_submission() {
        let transport = Arc::new(ScriptedTransport::new().script(RUN_TESTS, vec![started("r7")]));
        let orchestrator = orchestrator(&transport);

        let args = RunTestsArgs {
            wait_for_completion: Some(json!("false")),
            ..Default::default()
        };
        let envelope = orchestrator.run_tests(&args).await;

        assert!(envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("Test run started"));
        assert_eq!(envelope.data.unwrap().run_id.as_deref(), Some("r7"));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_numeric_run_id_is_polled() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(
                    RUN_TESTS,
                    vec![Reply::Envelope(json!({"success": true, "data": {"runId": 42}}))],
                )
                .script(GET_TEST_RUN_STATUS, vec![Reply::state("completed")])
                .script(GET_TEST_RUN_RESULT, vec![Reply::ok(json!({"state": "completed"}))]),
        );
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator.run_tests(&RunTestsArgs::default()).await;

        assert!(envelope.success);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Run '42' finished with state completed.")
        );
        let calls = transport.calls();
        assert_eq!(calls[1], (GET_TEST_RUN_STATUS.to_string(), json!({"runId": "42"})));
        assert_eq!(calls[2], (GET_TEST_RUN_RESULT.to_string(), json!({"runId": "42"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tests_without_run_id_passes_response_through() {
        let transport = Arc::new(ScriptedTransport::new().script(
            RUN_TESTS,
            vec![Reply::Envelope(json!({
                "success": false,
                "error": "A test run is already in progress"
            }))],
        ));
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator.run_tests(&RunTestsArgs::default()).await;

        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("A test run is already in progress"));
        assert!(envelope.data.is_none());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_tests_timeout_carries_last_snapshot() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RUN_TESTS, vec![started("r2")])
                .script(
                    GET_TEST_RUN_STATUS,
                    vec![Reply::ok(json!({
                        "runId": "r2",
                        "state": "running",
                        "summary": {"total": 8, "passed": 3}
                    }))],
                ),
        );
        let orchestrator = orchestrator(&transport);

        let args = RunTestsArgs {
            timeout_seconds: Some(json!("2")),
            ..Default::default()
        };
        let envelope = orchestrator.run_tests(&args).await;

        assert!(!envelope.success);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Test run 'r2' is still running after 2 seconds.")
        );
        assert_eq!(envelope.error, envelope.message);
        let data = envelope.data.unwrap();
        assert_eq!(data.state.as_deref(), Some("running"));
        assert_eq!(data.summary.unwrap().passed, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_snapshot_reports_unknown_state() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RUN_TESTS, vec![started("r3")])
                .script(GET_TEST_RUN_STATUS, vec![Reply::Fail("executor reloading".to_string())]),
        );
        let orchestrator = orchestrator(&transport);

        let args = RunTestsArgs {
            timeout_seconds: Some(json!(1)),
            ..Default::default()
        };
        let envelope = orchestrator.run_tests(&args).await;

        assert!(!envelope.success);
        assert_eq!(envelope.data, Some(RunResult::unknown("r3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies_when_none_given() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RUN_TESTS, vec![started("r4")])
                .script(GET_TEST_RUN_STATUS, vec![Reply::state("running")]),
        );
        let orchestrator = TestOrchestrator::new(
            Arc::clone(&transport) as Arc<dyn CommandTransport>,
            Arc::new(RecordingProgress::default()),
            PollerConfig {
                default_timeout: Duration::from_secs(3),
                ..Default::default()
            },
        );

        let envelope = orchestrator
            .run_tests(&RunTestsArgs {
                timeout_seconds: Some(json!("soon")),
                ..Default::default()
            })
            .await;

        assert_eq!(
            envelope.message.as_deref(),
            Some("Test run 'r4' is still running after 3 seconds.")
        );
        // Unparsable timeout is not forwarded either
        assert_eq!(transport.calls()[0].1.get("timeoutSeconds"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_returns_only_run_id() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RUN_TESTS, vec![started("r5")])
                .script(GET_TEST_RUN_STATUS, vec![Reply::state("completed")])
                .script(GET_TEST_RUN_RESULT, vec![Reply::Fail("pipe closed".to_string())]),
        );
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator.run_tests(&RunTestsArgs::default()).await;

        assert!(!envelope.success);
        let message = envelope.message.unwrap();
        assert!(message.starts_with("Failed to retrieve final results for run 'r5':"), "{message}");
        assert!(envelope.error.unwrap().contains("pipe closed"));
        assert_eq!(
            envelope.data,
            Some(RunResult {
                run_id: Some("r5".to_string()),
                ..Default::default()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_transport_failure_is_enveloped() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RUN_TESTS, vec![Reply::Fail("connection refused".to_string())]),
        );
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator.run_tests(&RunTestsArgs::default()).await;

        assert!(!envelope.success);
        assert!(envelope.error.unwrap().contains("connection refused"));
        assert!(envelope.data.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_polls_requested_run_when_response_has_no_id() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(
                    RERUN_FAILED_TESTS,
                    vec![Reply::Envelope(json!({"success": true, "message": "Rerun started"}))],
                )
                .script(GET_TEST_RUN_STATUS, vec![Reply::state("completed")])
                .script(
                    GET_TEST_RUN_RESULT,
                    vec![Reply::ok(json!({
                        "summary": {"total": 2, "passed": 2, "failed": 0, "skipped": 0}
                    }))],
                ),
        );
        let orchestrator = orchestrator(&transport);

        let args = RerunFailedArgs {
            run_id: Some(json!("r0")),
            ..Default::default()
        };
        let envelope = orchestrator.rerun_failed_tests(&args).await;

        assert!(envelope.success);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Run 'r0' finished with state completed: 2/2 passed, 0 failed, 0 skipped.")
        );
        let calls = transport.calls();
        assert_eq!(calls[0].1, json!({"runId": "r0", "waitForCompletion": false}));
        assert_eq!(calls[1].1, json!({"runId": "r0"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_timeout_message() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(RERUN_FAILED_TESTS, vec![started("r8")])
                .script(GET_TEST_RUN_STATUS, vec![Reply::state("running")]),
        );
        let orchestrator = orchestrator(&transport);

        let args = RerunFailedArgs {
            timeout_seconds: Some(json!(1)),
            ..Default::default()
        };
        let envelope = orchestrator.rerun_failed_tests(&args).await;

        assert!(!envelope.success);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Failed-test rerun 'r8' is still running after 1 seconds.")
        );
        assert_eq!(
            transport.calls()[0].1,
            json!({"timeoutSeconds": 1, "waitForCompletion": false})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_without_any_run_id_returns_submission() {
        let transport = Arc::new(ScriptedTransport::new().script(
            RERUN_FAILED_TESTS,
            vec![Reply::Envelope(json!({"success": false, "error": "No failed tests to rerun"}))],
        ));
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator.rerun_failed_tests(&RerunFailedArgs::default()).await;

        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("No failed tests to rerun"));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_list_tests_passes_response_through() {
        let transport = Arc::new(ScriptedTransport::new().script(
            LIST_TESTS,
            vec![Reply::ok(json!([{"fullName": "Foo.Bar", "mode": "EditMode"}]))],
        ));
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator
            .list_tests(&ListTestsArgs {
                mode: Some(json!("all")),
            })
            .await;

        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap()[0]["fullName"], "Foo.Bar");
        assert_eq!(transport.calls()[0].1, json!({}));

        orchestrator
            .list_tests(&ListTestsArgs {
                mode: Some(json!("editmode")),
            })
            .await;
        assert_eq!(transport.calls()[1].1, json!({"mode": "EditMode"}));
    }

    #[tokio::test]
    async fn test_list_tests_transport_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator = orchestrator(&transport);

        let envelope = orchestrator.list_tests(&ListTestsArgs::default()).await;

        assert!(!envelope.success);
        assert!(envelope.message.unwrap().starts_with("Failed to send list_tests"));
    }
}
