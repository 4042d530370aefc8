//! Application state

use std::sync::Arc;

use test_runner::TestOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: TestOrchestrator,
    executor_url: String,
}

impl AppState {
    pub fn new(orchestrator: TestOrchestrator, executor_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                executor_url: executor_url.into(),
            }),
        }
    }

    pub fn orchestrator(&self) -> &TestOrchestrator {
        &self.inner.orchestrator
    }

    pub fn executor_url(&self) -> &str {
        &self.inner.executor_url
    }
}
