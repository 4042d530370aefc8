//! Command payloads sent to the remote test executor
//!
//! Caller arguments arrive as loosely typed JSON (`*Args`). Each args type
//! knows how to turn itself into a canonical request, merging alias fields
//! and omitting anything absent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::normalize::{
    coerce_bool, coerce_int, coerce_string_list, coerce_text, combine_string_lists,
};
use crate::{Error, Result};

pub const LIST_TESTS: &str = "list_tests";
pub const RUN_TESTS: &str = "run_tests";
pub const RERUN_FAILED_TESTS: &str = "rerun_failed_tests";
pub const GET_TEST_RUN_STATUS: &str = "get_test_run_status";
pub const GET_TEST_RUN_RESULT: &str = "get_test_run_result";

/// Test Runner mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestMode {
    EditMode,
    PlayMode,
}

impl TestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EditMode => "EditMode",
            Self::PlayMode => "PlayMode",
        }
    }
}

impl Default for TestMode {
    fn default() -> Self {
        Self::EditMode
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "editmode" | "edit" => Ok(Self::EditMode),
            "playmode" | "play" => Ok(Self::PlayMode),
            _ => Err(Error::InvalidInput(format!("Invalid test mode: {}", s))),
        }
    }
}

/// Mode filter for listing. `None` means every mode.
///
/// An unrecognized mode is forwarded trimmed so the executor can reject it,
/// rather than silently widening the listing to every mode.
fn list_mode(value: Option<&Value>) -> Option<String> {
    let text = coerce_text(value)?;
    if text.eq_ignore_ascii_case("all") {
        return None;
    }
    match text.parse::<TestMode>() {
        Ok(mode) => Some(mode.to_string()),
        Err(e) => {
            warn!("{}; forwarding as given", e);
            Some(text)
        }
    }
}

fn run_mode(value: Option<&Value>) -> TestMode {
    let Some(text) = coerce_text(value) else {
        return TestMode::default();
    };
    text.parse().unwrap_or_else(|e| {
        warn!("{}; using {}", e, TestMode::default());
        TestMode::default()
    })
}

// ============================================================================
// Caller arguments
// ============================================================================

/// Arguments for `list_tests`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListTestsArgs {
    /// "EditMode", "PlayMode" or "All"
    pub mode: Option<Value>,
}

impl ListTestsArgs {
    pub fn to_request(&self) -> ListRequest {
        ListRequest {
            mode: list_mode(self.mode.as_ref()),
        }
    }
}

/// Arguments for `run_tests`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunTestsArgs {
    pub mode: Option<Value>,
    pub timeout_seconds: Option<Value>,
    /// Set false to return immediately after starting the run
    pub wait_for_completion: Option<Value>,
    pub test_names: Option<Value>,
    /// Alias for `test_names`
    pub tests: Option<Value>,
    pub group_names: Option<Value>,
    pub category_names: Option<Value>,
    /// Alias for `category_names`
    pub categories: Option<Value>,
    pub assembly_names: Option<Value>,
    /// Alias for `assembly_names`
    pub assemblies: Option<Value>,
}

impl RunTestsArgs {
    pub fn wait_for_completion(&self) -> bool {
        coerce_bool(self.wait_for_completion.as_ref(), true)
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        coerce_int(self.timeout_seconds.as_ref(), None)
    }

    pub fn to_request(&self) -> RunRequest {
        RunRequest {
            mode: run_mode(self.mode.as_ref()),
            timeout_seconds: self.timeout_seconds(),
            wait_for_completion: false,
            test_names: combine_string_lists([self.test_names.as_ref(), self.tests.as_ref()]),
            group_names: coerce_string_list(self.group_names.as_ref()),
            category_names: combine_string_lists([
                self.category_names.as_ref(),
                self.categories.as_ref(),
            ]),
            assembly_names: combine_string_lists([
                self.assembly_names.as_ref(),
                self.assemblies.as_ref(),
            ]),
        }
    }
}

/// Arguments for `rerun_failed_tests`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RerunFailedArgs {
    /// Run to pull failures from; the executor defaults to its last completed run
    pub run_id: Option<Value>,
    pub wait_for_completion: Option<Value>,
    pub timeout_seconds: Option<Value>,
}

impl RerunFailedArgs {
    pub fn run_id(&self) -> Option<String> {
        coerce_text(self.run_id.as_ref())
    }

    pub fn wait_for_completion(&self) -> bool {
        coerce_bool(self.wait_for_completion.as_ref(), true)
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        coerce_int(self.timeout_seconds.as_ref(), None)
    }

    pub fn to_request(&self) -> RerunRequest {
        RerunRequest {
            run_id: self.run_id(),
            timeout_seconds: self.timeout_seconds(),
            wait_for_completion: false,
        }
    }
}

// ============================================================================
// Canonical requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Submission payload for `run_tests`.
///
/// `wait_for_completion` is always sent as false: waiting happens on this
/// side by polling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub mode: TestMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    pub wait_for_completion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    pub wait_for_completion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunIdParams<'a> {
    run_id: &'a str,
}

/// A command understood by the remote executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestCommand {
    List(ListRequest),
    Run(RunRequest),
    RerunFailed(RerunRequest),
    Status { run_id: String },
    Result { run_id: String },
}

impl TestCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List(_) => LIST_TESTS,
            Self::Run(_) => RUN_TESTS,
            Self::RerunFailed(_) => RERUN_FAILED_TESTS,
            Self::Status { .. } => GET_TEST_RUN_STATUS,
            Self::Result { .. } => GET_TEST_RUN_RESULT,
        }
    }

    /// JSON params object for the command
    pub fn params(&self) -> Result<Value> {
        let value = match self {
            Self::List(req) => serde_json::to_value(req)?,
            Self::Run(req) => serde_json::to_value(req)?,
            Self::RerunFailed(req) => serde_json::to_value(req)?,
            Self::Status { run_id } | Self::Result { run_id } => {
                serde_json::to_value(RunIdParams { run_id })?
            }
        };
        Ok(value)
    }
}
