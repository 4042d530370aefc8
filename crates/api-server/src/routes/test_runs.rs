//! Test run API endpoints
//!
//! Every endpoint answers HTTP 200 with a `ResponseEnvelope`; failures are
//! reported through `success: false` in the body.

use axum::{extract::State, routing::post, Json, Router};
use serde_json::Value;

use testrun_core::{ListTestsArgs, RerunFailedArgs, ResponseEnvelope, RunResult, RunTestsArgs};

use crate::state::AppState;

/// POST /api/v1/tests/list - List tests known to the executor
async fn list_tests(
    State(state): State<AppState>,
    Json(args): Json<ListTestsArgs>,
) -> Json<ResponseEnvelope<Value>> {
    Json(state.orchestrator().list_tests(&args).await)
}

/// POST /api/v1/tests/run - Start a test run and wait for it
async fn run_tests(
    State(state): State<AppState>,
    Json(args): Json<RunTestsArgs>,
) -> Json<ResponseEnvelope<RunResult>> {
    tracing::info!(
        "Run request: mode={:?}, wait={}, timeout={:?}",
        args.mode,
        args.wait_for_completion(),
        args.timeout_seconds()
    );
    Json(state.orchestrator().run_tests(&args).await)
}

/// POST /api/v1/tests/rerun-failed - Rerun the failures of a previous run
async fn rerun_failed_tests(
    State(state): State<AppState>,
    Json(args): Json<RerunFailedArgs>,
) -> Json<ResponseEnvelope<RunResult>> {
    tracing::info!("Rerun request for run {:?}", args.run_id());
    Json(state.orchestrator().rerun_failed_tests(&args).await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/tests/list", post(list_tests))
        .route("/api/v1/tests/run", post(run_tests))
        .route("/api/v1/tests/rerun-failed", post(rerun_failed_tests))
}
