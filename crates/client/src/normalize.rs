//! Response normalizer.
//!
//! The upstream API returns the same logical data in several shapes (wrapped
//! objects vs bare lists, aliased field names, three timestamp encodings).
//! Each response family gets an ordered list of shape-matchers, tried in
//! fixed priority order; the first match wins. Isolating this here keeps the
//! gateway's business logic free of shape branching.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::{DatasetRecord, DocumentStatus, FileRecord, SearchHit};

/// Epoch values above this are taken to be milliseconds.
const MILLIS_EPOCH_CUTOFF: f64 = 1e10;

fn str_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn u64_field(entry: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| entry.get(*key).and_then(Value::as_u64))
}

/// Upstream envelope code (`0` means success), when present.
pub fn response_code(response: &Value) -> Option<i64> {
    response.get("code").and_then(Value::as_i64)
}

/// Upstream envelope message, when present.
pub fn response_message(response: &Value) -> Option<&str> {
    response.get("message").and_then(Value::as_str)
}

/// Locate the created document in an upload response.
///
/// Tried in order: `data` as a list (first element), `data` as an object,
/// the response itself when it carries a top-level `id`.
pub fn uploaded_document(response: &Value) -> Option<&Value> {
    if let Some(first) = response
        .get("data")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    {
        // An empty data list is not a match; later shapes still get a try.
        return Some(first);
    }
    if let Some(object) = response.get("data").filter(|v| v.is_object()) {
        return Some(object);
    }
    if response.get("id").is_some() {
        return Some(response);
    }
    None
}

/// Document id with field-name fallbacks: `id`, `document_id`, `file_id`.
pub fn document_id(document: &Value) -> Option<String> {
    str_field(document, &["id", "document_id", "file_id"])
}

/// File-list entries plus the upstream total.
///
/// Shapes, in priority order: `{data: {docs, total}}`, a bare list under
/// `data` (or at the top level), `{data: {files | documents}}`.
pub fn file_entries(response: &Value) -> (Vec<Value>, u64) {
    let data = response.get("data").unwrap_or(response);

    if let Some(docs) = data.get("docs").and_then(Value::as_array) {
        let total = u64_field(data, &["total"]).unwrap_or(docs.len() as u64);
        return (docs.clone(), total);
    }
    if let Some(list) = data.as_array() {
        return (list.clone(), list.len() as u64);
    }
    for key in ["files", "documents"] {
        if let Some(list) = data.get(key).and_then(Value::as_array) {
            return (list.clone(), list.len() as u64);
        }
    }
    (Vec::new(), 0)
}

/// Fixed mapping from the upstream `run` field to a document status.
pub fn run_to_document_status(run: &str) -> DocumentStatus {
    match run {
        "DONE" => DocumentStatus::Completed,
        "RUNNING" => DocumentStatus::Processing,
        "FAIL" | "CANCEL" => DocumentStatus::Failed,
        // UNSTART and anything unrecognized: stored but not yet processed.
        _ => DocumentStatus::Uploaded,
    }
}

fn epoch_to_datetime(epoch: f64, allow_millis: bool) -> Option<DateTime<Utc>> {
    let seconds = if allow_millis && epoch > MILLIS_EPOCH_CUTOFF {
        epoch / 1000.0
    } else {
        epoch
    };
    if !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_opt(seconds as i64, 0).single()
}

fn parse_timestamp_value(value: &Value, allow_millis: bool) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            if raw.contains('T') {
                DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00"))
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            } else {
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(|epoch| epoch_to_datetime(epoch, allow_millis))
            }
        }
        Value::Number(n) => n.as_f64().and_then(|epoch| epoch_to_datetime(epoch, allow_millis)),
        _ => None,
    }
}

/// File creation time: ISO-8601 with `Z`, numeric string, or raw epoch
/// seconds. Unparseable values default to "now" so one bad record never
/// fails a whole listing, and listings stay sortable.
pub fn file_timestamp(entry: &Value) -> DateTime<Utc> {
    ["created_at", "upload_time"]
        .iter()
        .filter_map(|key| entry.get(*key))
        .find_map(|value| parse_timestamp_value(value, false))
        .unwrap_or_else(Utc::now)
}

/// Dataset creation time; additionally handles millisecond epochs and
/// tolerates missing/unparseable values as `None`.
pub fn dataset_timestamp(entry: &Value) -> Option<DateTime<Utc>> {
    ["created_at", "create_time"]
        .iter()
        .filter_map(|key| entry.get(*key))
        .find_map(|value| parse_timestamp_value(value, true))
}

/// Canonical file record from one list entry.
pub fn file_record(entry: &Value) -> FileRecord {
    let run = str_field(entry, &["run"]).unwrap_or_else(|| "UNSTART".to_string());
    FileRecord {
        file_id: str_field(entry, &["id", "file_id"]).unwrap_or_default(),
        name: str_field(entry, &["name", "filename"]).unwrap_or_else(|| "unknown".to_string()),
        size_bytes: u64_field(entry, &["size", "file_size"]).unwrap_or(0),
        created_at: file_timestamp(entry),
        status: run_to_document_status(&run),
        chunk_count: u64_field(entry, &["chunk_count", "chunks"]),
    }
}

/// Dataset-list entries plus the upstream total.
///
/// Shapes, in priority order: `data` as a bare list,
/// `{data: {datasets | items, total}}`.
pub fn dataset_entries(response: &Value) -> (Vec<Value>, u64) {
    let data = response.get("data").unwrap_or(response);

    if let Some(list) = data.as_array() {
        return (list.clone(), list.len() as u64);
    }
    if data.is_object() {
        for key in ["datasets", "items"] {
            if let Some(list) = data.get(key).and_then(Value::as_array) {
                let total = u64_field(data, &["total"]).unwrap_or(list.len() as u64);
                return (list.clone(), total);
            }
        }
    }
    // `data` can be a scalar (e.g. `false`) on auth problems; treat as empty.
    (Vec::new(), 0)
}

/// Canonical dataset record from one list entry.
pub fn dataset_record(entry: &Value) -> DatasetRecord {
    DatasetRecord {
        dataset_id: str_field(entry, &["id", "dataset_id"]).unwrap_or_default(),
        name: str_field(entry, &["name", "title"]).unwrap_or_else(|| "unknown".to_string()),
        description: str_field(entry, &["description", "desc"]),
        file_count: u64_field(entry, &["file_count", "document_count"]).unwrap_or(0),
        created_at: dataset_timestamp(entry),
    }
}

/// Search hits from `data.chunks`, or a top-level `chunks` list.
///
/// Scores outside [0, 1] are clamped; missing fields fall back per the
/// documented aliases.
pub fn search_hits(response: &Value) -> Vec<SearchHit> {
    let chunks = response
        .get("data")
        .and_then(|data| data.get("chunks"))
        .and_then(Value::as_array)
        .or_else(|| response.get("chunks").and_then(Value::as_array));

    let Some(chunks) = chunks else {
        return Vec::new();
    };

    chunks
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| SearchHit {
            content: str_field(entry, &["content"]).unwrap_or_default(),
            score: entry
                .get("similarity")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 1.0),
            file_name: str_field(entry, &["document_name"])
                .unwrap_or_else(|| "unknown".to_string()),
            file_id: str_field(entry, &["document_id"]).unwrap_or_default(),
            chunk_id: str_field(entry, &["id"]).unwrap_or_default(),
        })
        .collect()
}
