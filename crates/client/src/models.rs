//! Canonical result records returned by gateway operations.
//!
//! All records are immutable value types created fresh from a parsed HTTP
//! response; nothing here is cached or mutated after construction.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal state of an upload or update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Failed,
    Processing,
    Pending,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Processing => "processing",
            Self::Pending => "pending",
        }
    }

    /// Lenient mapping from an upstream status string; unknown values are
    /// treated as success since the HTTP layer already rejected failures.
    pub fn from_upstream(raw: &str) -> Self {
        match raw {
            "failed" => Self::Failed,
            "processing" => Self::Processing,
            "pending" => Self::Pending,
            _ => Self::Success,
        }
    }
}

/// Processing state of a stored document, derived from the upstream `run`
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }
}

/// Status reported by a point-in-time snapshot; `Unknown` rather than an
/// error when the file cannot be located, so polling loops never crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl From<DocumentStatus> for SnapshotStatus {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Uploaded => Self::Uploaded,
            DocumentStatus::Processing => Self::Processing,
            DocumentStatus::Completed => Self::Completed,
            DocumentStatus::Failed => Self::Failed,
            // Listings never report deleted files; anything else is unknown.
            DocumentStatus::Deleted => Self::Unknown,
        }
    }
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Success,
    Failed,
    NotFound,
}

impl DeleteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub file_id: String,
    pub status: OperationStatus,
    pub message: String,
    pub chunk_count: Option<u64>,
}

/// Structurally identical to [`UploadOutcome`], but semantically distinct:
/// the update workflow is delete-then-reupload, so `file_id` is a *new*
/// upstream id that callers must treat as authoritative going forward.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub file_id: String,
    pub status: OperationStatus,
    pub message: String,
    pub chunk_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub content: String,
    /// Always within [0, 1]; out-of-range upstream values are clamped at
    /// normalization.
    pub score: f64,
    pub file_name: String,
    pub file_id: String,
    pub chunk_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Descending by score; ties keep upstream order.
    pub hits: Vec<SearchHit>,
    /// Count after local filtering, never the raw upstream count.
    pub total_count: usize,
    pub query_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub file_id: String,
    pub name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub chunk_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileListOutcome {
    /// Upstream order preserved.
    pub files: Vec<FileRecord>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetRecord {
    pub dataset_id: String,
    pub name: String,
    pub description: Option<String>,
    pub file_count: u64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetListOutcome {
    pub datasets: Vec<DatasetRecord>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub file_id: String,
    pub status: DeleteStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileStatusSnapshot {
    pub file_id: String,
    pub status: SnapshotStatus,
    pub progress: Option<f64>,
    pub error_message: Option<String>,
    pub chunk_count: Option<u64>,
}

impl FileStatusSnapshot {
    /// Snapshot for a file that could not be located anywhere.
    pub fn unknown(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            status: SnapshotStatus::Unknown,
            progress: None,
            error_message: None,
            chunk_count: None,
        }
    }
}
