//! Parameter validation engine.
//!
//! Pure checks applied before any network call. Each function takes the raw
//! value plus the parameter name (for error attribution) and returns the
//! coerced value or a `Validation` failure naming the field.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{RagflowError, Result};

/// Upstream-defined document splitting strategies.
pub const CHUNK_METHODS: [&str; 12] = [
    "naive",
    "manual",
    "qa",
    "table",
    "paper",
    "book",
    "laws",
    "presentation",
    "picture",
    "one",
    "knowledge_graph",
    "email",
];

/// Extensions accepted for upload. Keeps executable content out of the
/// knowledge base even when the operator is trusted.
pub const ALLOWED_EXTENSIONS: [&str; 10] = [
    "txt", "pdf", "doc", "docx", "md", "html", "csv", "json", "xml", "rtf",
];

const MAX_QUERY_WORDS: usize = 50;

static INJECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)<script[^>]*>").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)data:").unwrap(),
        Regex::new(r"(?i)vbscript:").unwrap(),
    ]
});

/// Validate a string argument: trimmed, length within `[min_len, max_len]`,
/// no control characters other than tab/newline/carriage-return.
pub fn string(value: &str, name: &str, min_len: usize, max_len: usize) -> Result<String> {
    let value = value.trim();
    if value.chars().count() < min_len {
        return Err(RagflowError::validation(
            format!("{name} must be at least {min_len} characters long"),
            name,
        ));
    }
    if value.chars().count() > max_len {
        return Err(RagflowError::validation(
            format!("{name} cannot exceed {max_len} characters"),
            name,
        ));
    }
    if value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\t' | '\r'))
    {
        return Err(RagflowError::validation(
            format!("{name} contains invalid control characters"),
            name,
        ));
    }
    Ok(value.to_string())
}

/// Validate an integer argument. Accepts JSON integers, integer-valued
/// floats, and numeric strings; rejects everything else.
pub fn integer(value: &Value, name: &str, min: Option<i64>, max: Option<i64>) -> Result<i64> {
    let invalid = || RagflowError::validation(format!("{name} must be an integer"), name);

    let coerced = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                let f = n.as_f64().ok_or_else(invalid)?;
                if f.fract() != 0.0 || !f.is_finite() {
                    return Err(invalid());
                }
                f as i64
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if let Some(min) = min {
        if coerced < min {
            return Err(RagflowError::validation(
                format!("{name} must be at least {min}"),
                name,
            ));
        }
    }
    if let Some(max) = max {
        if coerced > max {
            return Err(RagflowError::validation(
                format!("{name} cannot exceed {max}"),
                name,
            ));
        }
    }
    Ok(coerced)
}

/// Validate a float argument. Accepts JSON numbers and numeric strings;
/// rejects NaN and infinities explicitly.
pub fn float(value: &Value, name: &str, min: Option<f64>, max: Option<f64>) -> Result<f64> {
    let invalid = || RagflowError::validation(format!("{name} must be a number"), name);

    let coerced = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if coerced.is_nan() {
        return Err(RagflowError::validation(
            format!("{name} cannot be NaN"),
            name,
        ));
    }
    if coerced.is_infinite() {
        return Err(RagflowError::validation(
            format!("{name} cannot be infinite"),
            name,
        ));
    }
    if let Some(min) = min {
        if coerced < min {
            return Err(RagflowError::validation(
                format!("{name} must be at least {min}"),
                name,
            ));
        }
    }
    if let Some(max) = max {
        if coerced > max {
            return Err(RagflowError::validation(
                format!("{name} cannot exceed {max}"),
                name,
            ));
        }
    }
    Ok(coerced)
}

/// Validate and normalize a local file path.
///
/// Rejects empty paths, embedded NUL bytes, and missing or disallowed
/// extensions.
/// Traversal patterns (`..`, leading separator) are logged for audit but not
/// rejected: the path comes from a trusted local operator.
pub fn file_path(raw: &str, name: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RagflowError::validation(
            format!("{name} cannot be empty"),
            name,
        ));
    }
    if raw.contains('\0') {
        return Err(RagflowError::validation(
            format!("{name} contains null bytes"),
            name,
        ));
    }

    let path = Path::new(raw);
    if path.components().any(|c| matches!(c, Component::ParentDir)) || path.is_absolute() {
        log::warn!("Absolute or parent directory path used: {raw}");
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        Some(ext) => {
            return Err(RagflowError::validation(
                format!(
                    "Unsupported file type: .{ext}. Allowed: {}",
                    ALLOWED_EXTENSIONS.join(", ")
                ),
                name,
            ));
        }
        None => {
            return Err(RagflowError::validation(
                format!(
                    "Unsupported file type: no extension. Allowed: {}",
                    ALLOWED_EXTENSIONS.join(", ")
                ),
                name,
            ));
        }
    }

    std::path::absolute(path).map_err(|err| {
        RagflowError::validation(format!("Invalid file path format: {err}"), name)
    })
}

/// Validate the chunk method against the upstream's fixed strategy set,
/// normalizing to lowercase.
pub fn chunk_method(raw: &str) -> Result<String> {
    let normalized = raw.trim().to_lowercase();
    if !CHUNK_METHODS.contains(&normalized.as_str()) {
        let mut sorted = CHUNK_METHODS;
        sorted.sort_unstable();
        return Err(RagflowError::validation(
            format!("chunk_method must be one of: {}", sorted.join(", ")),
            "chunk_method",
        ));
    }
    Ok(normalized)
}

/// Validate a search query: standard string rules plus a scan for
/// script/markup injection patterns, since the query may be echoed into a
/// downstream rendering surface.
pub fn query(raw: &str, name: &str) -> Result<String> {
    let value = string(raw, name, 1, 1000)?;

    if value.split_whitespace().count() > MAX_QUERY_WORDS {
        return Err(RagflowError::validation(
            format!("Query is too long (max {MAX_QUERY_WORDS} words)"),
            name,
        ));
    }

    for pattern in INJECTION_PATTERNS.iter() {
        if pattern.is_match(&value) {
            log::warn!("Potentially suspicious query pattern detected: {pattern}");
            return Err(RagflowError::validation(
                "Query contains potentially unsafe content",
                name,
            ));
        }
    }
    Ok(value)
}
