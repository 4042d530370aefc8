//! Uniform response envelope
//!
//! Both the remote executor's raw replies and every public operation share
//! this `{success, message, error, data}` shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::coerce_text;

/// Error fragments the executor uses when it no longer tracks a run
const RUN_GONE_MARKERS: [&str; 2] = ["not found", "no active"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Raw reply from the remote executor
pub type CommandResponse = ResponseEnvelope<Value>;

impl<T> ResponseEnvelope<T> {
    pub fn ok(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data,
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            error: Some(error.into()),
            data,
        }
    }

    /// The error text, falling back to the message
    pub fn error_text(&self) -> &str {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or_default()
    }

    /// Whether this failed reply says the run is no longer tracked remotely
    pub fn indicates_run_gone(&self) -> bool {
        if self.success {
            return false;
        }
        let text = self.error_text().to_lowercase();
        RUN_GONE_MARKERS.iter().any(|marker| text.contains(marker))
    }

    pub fn map_data<U>(self, f: impl FnOnce(T) -> Option<U>) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            success: self.success,
            message: self.message,
            error: self.error,
            data: self.data.and_then(f),
        }
    }
}

impl ResponseEnvelope<Value> {
    /// Reinterpret `data` as a typed payload, dropping it if it does not fit
    pub fn into_typed<U: DeserializeOwned>(self) -> ResponseEnvelope<U> {
        self.map_data(|value| serde_json::from_value(value).ok())
    }

    /// Look up an identifier-like field inside `data`; numbers are stringified
    pub fn data_text(&self, key: &str) -> Option<String> {
        match self.data.as_ref().and_then(|data| data.get(key)) {
            Some(value @ (Value::String(_) | Value::Number(_))) => coerce_text(Some(value)),
            _ => None,
        }
    }
}
