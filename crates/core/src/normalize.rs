//! Value normalization for caller-supplied arguments
//!
//! Callers may hand us any JSON shape for a field: a number as a string, a
//! single name where a list is expected, a boolean spelled `"yes"`. Every
//! function here is total: it returns a canonical value or the documented
//! default and never fails.

use std::collections::HashSet;

use serde_json::Value;

const TRUE_WORDS: [&str; 5] = ["true", "1", "yes", "y", "on"];
const FALSE_WORDS: [&str; 5] = ["false", "0", "no", "n", "off"];

/// Best-effort conversion to a positive integer.
///
/// Booleans are rejected even though JSON tooling sometimes treats them as
/// numbers. Fractional values truncate toward zero. Anything non-positive or
/// unparsable yields `default`.
pub fn coerce_int(value: Option<&Value>, default: Option<u64>) -> Option<u64> {
    let parsed = match value {
        None | Some(Value::Null) | Some(Value::Bool(_)) => return default,
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Some(i as i128)
            } else if let Some(u) = n.as_u64() {
                Some(u as i128)
            } else {
                n.as_f64().and_then(truncate_float)
            }
        }
        Some(Value::String(s)) => parse_int_text(s),
        Some(_) => None,
    };

    match parsed {
        Some(n) if n > 0 => Some(u64::try_from(n).unwrap_or(u64::MAX)),
        _ => default,
    }
}

fn parse_int_text(text: &str) -> Option<i128> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered == "none" || lowered == "null" {
        return None;
    }
    trimmed
        .parse::<i128>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate_float))
}

fn truncate_float(f: f64) -> Option<i128> {
    if !f.is_finite() {
        return None;
    }
    // Saturating cast, so huge values land on i128::MAX instead of wrapping
    Some(f.trunc() as i128)
}

/// Normalize disparate truthy/falsy input values.
pub fn coerce_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        Some(Value::String(s)) => {
            let text = s.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&text.as_str()) {
                true
            } else if FALSE_WORDS.contains(&text.as_str()) {
                false
            } else {
                default
            }
        }
        Some(_) => default,
    }
}

/// Accept a string, a list or a scalar and return the distinct, trimmed,
/// non-blank entries in first-seen order.
///
/// Returns `None` rather than an empty list so that "no filter" stays
/// distinguishable from "a filter that matches nothing".
pub fn coerce_string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let value = value?;
    let candidates: Vec<Option<String>> = match value {
        Value::Null => return None,
        Value::Array(items) => items.iter().map(stringify).collect(),
        // Iterating a mapping yields its keys
        Value::Object(map) => map.keys().map(|k| trimmed(k)).collect(),
        scalar => vec![stringify(scalar)],
    };

    let mut seen = HashSet::new();
    let unique: Vec<String> = candidates
        .into_iter()
        .flatten()
        .filter(|entry| seen.insert(entry.clone()))
        .collect();

    if unique.is_empty() {
        None
    } else {
        Some(unique)
    }
}

/// Merge values sourced from a primary field and its aliases.
pub fn combine_string_lists<'a, I>(values: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let mut seen = HashSet::new();
    let mut combined = Vec::new();

    for value in values {
        let Some(entries) = coerce_string_list(value) else {
            continue;
        };
        for entry in entries {
            if seen.insert(entry.clone()) {
                combined.push(entry);
            }
        }
    }

    if combined.is_empty() {
        None
    } else {
        Some(combined)
    }
}

/// Trim a free-form string field, treating blanks as absent.
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    value.and_then(stringify)
}

fn stringify(item: &Value) -> Option<String> {
    match item {
        Value::Null => None,
        Value::String(s) => trimmed(s),
        other => trimmed(&other.to_string()),
    }
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
