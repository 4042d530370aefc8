//! Run status and result models
//!
//! These mirror what the remote executor reports. Every field is optional
//! on the wire, so deserialization is lenient and unknown fields are ignored.
//! A field of the wrong type reads as absent instead of failing the whole
//! payload, so a stray counter can never hide the run state.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::coerce_text;

/// Remote states after which a run no longer changes.
pub const TERMINAL_STATES: [&str; 5] = ["completed", "failed", "canceled", "cancelled", "faulted"];

/// Check a free-form remote state against the terminal vocabulary
pub fn is_terminal_state(state: &str) -> bool {
    let state = state.trim().to_ascii_lowercase();
    TERMINAL_STATES.contains(&state.as_str())
}

/// Aggregate counts for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSummary {
    #[serde(deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub passed: Option<u64>,
    #[serde(deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    #[serde(deserialize_with = "lenient_seconds", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub result_state: Option<String>,
}

impl RunSummary {
    /// Whether any of the four counters were reported
    pub fn has_counts(&self) -> bool {
        self.total.is_some()
            || self.passed.is_some()
            || self.failed.is_some()
            || self.skipped.is_some()
    }
}

/// Outcome of a single test case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestCaseResult {
    #[serde(deserialize_with = "text_or_empty")]
    pub name: String,
    #[serde(deserialize_with = "text_or_empty")]
    pub full_name: String,
    #[serde(deserialize_with = "text_or_empty")]
    pub state: String,
    #[serde(deserialize_with = "seconds_or_zero")]
    pub duration_seconds: f64,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Point-in-time status of a run, as returned by a status query.
///
/// Only the remote executor mutates the underlying run; the poller just
/// reads these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSnapshot {
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient_object", skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(deserialize_with = "lenient_results", skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TestCaseResult>>,
}

impl RunSnapshot {
    /// Check if the reported state is terminal
    pub fn is_terminal(&self) -> bool {
        self.state.as_deref().is_some_and(is_terminal_state)
    }

    /// Reported state, or `default` when the executor has not reported one
    pub fn state_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.state.as_deref().filter(|s| !s.is_empty()).unwrap_or(default)
    }

    /// Degrade this snapshot into a result without per-test detail.
    ///
    /// Used when a terminal state was observed but the detailed result could
    /// not be fetched.
    pub fn into_summary_result(self, run_id: &str) -> RunResult {
        RunResult {
            run_id: self.run_id.or_else(|| Some(run_id.to_string())),
            mode: self.mode,
            state: self.state,
            summary: self.summary,
            results: None,
        }
    }

    /// Convert into a result carrying everything the snapshot had
    pub fn into_result(self) -> RunResult {
        RunResult {
            run_id: self.run_id,
            mode: self.mode,
            state: self.state,
            summary: self.summary,
            results: self.results,
        }
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunResult {
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient_object", skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(deserialize_with = "lenient_results", skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TestCaseResult>>,
}

impl RunResult {
    /// Placeholder used when a run timed out before any status was observed
    pub fn unknown(run_id: &str) -> Self {
        Self {
            run_id: Some(run_id.to_string()),
            state: Some("Unknown".to_string()),
            ..Default::default()
        }
    }

    /// Human-readable one-line summary of a finished run
    pub fn summary_message(&self, run_id: &str) -> String {
        let summary = self.summary.clone().unwrap_or_default();
        let state = summary
            .result_state
            .as_deref()
            .or(self.state.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown");

        if !summary.has_counts() {
            return format!("Run '{}' finished with state {}.", run_id, state);
        }

        format!(
            "Run '{}' finished with state {}: {}/{} passed, {} failed, {} skipped.",
            run_id,
            state,
            summary.passed.unwrap_or(0),
            summary.total.unwrap_or(0),
            summary.failed.unwrap_or(0),
            summary.skipped.unwrap_or(0),
        )
    }
}

// ============================================================================
// Field-level lenient deserializers
// ============================================================================

/// String or number, trimmed; blanks and other types read as absent
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(_) | Value::Number(_) => coerce_text(Some(&value)),
        _ => None,
    })
}

fn text_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Strings kept verbatim (stack traces keep their layout)
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite() && *n >= 0.0)
}

/// Non-negative count; `3`, `3.0` and `"3"` all read as 3
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Number(n) if n.as_u64().is_some() => n.as_u64(),
        other => number_of(other).map(|n| n.trunc() as u64),
    })
}

fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(number_of(&Value::deserialize(deserializer)?))
}

fn seconds_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(lenient_seconds(deserializer)?.unwrap_or_default())
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Entries that are not objects are skipped; the rest are kept in order
fn lenient_results<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<TestCaseResult>>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}
