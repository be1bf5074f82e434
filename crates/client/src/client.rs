//! Knowledge-base gateway.
//!
//! One method per logical operation. Each call validates its parameters,
//! issues the HTTP requests through the retry engine, and returns a canonical
//! record. Multi-step workflows (upload with auto-processing, update as
//! delete-then-reupload) keep their best-effort sub-steps explicit: a failed
//! sub-step either propagates or is reflected as a caveat in the outcome
//! message, never silently dropped.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::RagflowConfig;
use crate::error::{RagflowError, Result};
use crate::http::{Method, MultipartPayload, RequestBody, RequestEngine};
use crate::models::{
    DatasetListOutcome, DeleteOutcome, DeleteStatus, FileListOutcome, FileRecord,
    FileStatusSnapshot, OperationStatus, SearchOutcome, SnapshotStatus, UpdateOutcome,
    UploadOutcome,
};
use crate::normalize;
use crate::validate;

/// Hard cap on uploaded file size.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Page size used when a whole dataset must be scanned for one file.
const STATUS_PROBE_LIMIT: usize = 1000;

/// How long an update waits for re-embedding before giving up.
const REEMBED_WAIT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const POLL_INTERVAL_AFTER_ERROR: Duration = Duration::from_secs(5);

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "md" => "text/markdown",
        "html" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "rtf" => "application/rtf",
        _ => "application/octet-stream",
    }
}

/// Typed client over the upstream knowledge-base HTTP API.
///
/// Cheap to share by reference; all methods take `&self` and the underlying
/// connection pool is created lazily. [`close`](Self::close) releases the
/// pool and is idempotent.
pub struct RagflowClient {
    engine: RequestEngine,
}

impl RagflowClient {
    pub fn new(config: RagflowConfig) -> Self {
        log::info!("Knowledge-base client initialized for {}", config.base_url);
        Self {
            engine: RequestEngine::new(config),
        }
    }

    /// Build a client over a caller-supplied transport. Used by tests to
    /// script responses without a live server.
    pub fn with_transport(
        config: RagflowConfig,
        transport: Arc<dyn crate::http::HttpTransport>,
    ) -> Self {
        Self {
            engine: RequestEngine::with_transport(config, transport),
        }
    }

    /// Release pooled connections. Safe to call more than once; the next
    /// operation transparently reopens the pool.
    pub async fn close(&self) {
        self.engine.close().await;
    }

    /// Upload a local file into a dataset and kick off chunking/embedding.
    ///
    /// Processing start is best-effort: when the trigger fails the upload
    /// still succeeds and the outcome message notes that manual processing
    /// may be required.
    pub async fn upload_file(
        &self,
        file_path: &str,
        dataset_id: &str,
        chunk_method: &str,
    ) -> Result<UploadOutcome> {
        let dataset_id = validate::string(dataset_id, "dataset_id", 1, 100)?;
        let chunk_method = validate::chunk_method(chunk_method)?;
        let path = validate::file_path(file_path, "file_path")?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RagflowError::validation("file_path has no file name component", "file_path")
            })?;

        self.upload_with_name(&path, &file_name, &dataset_id, &chunk_method, true)
            .await
    }

    /// Shared upload workflow. `display_name` is the name stored upstream,
    /// which the update workflow pins to the replaced file's original name.
    async fn upload_with_name(
        &self,
        path: &Path,
        display_name: &str,
        dataset_id: &str,
        chunk_method: &str,
        auto_process: bool,
    ) -> Result<UploadOutcome> {
        let shown = path.display().to_string();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| RagflowError::file(format!("File not found: {shown}"), &shown))?;
        if !metadata.is_file() {
            return Err(RagflowError::file(
                format!("Path is not a file: {shown}"),
                &shown,
            ));
        }
        let size = metadata.len();
        if size > MAX_FILE_SIZE {
            return Err(RagflowError::file(
                format!("File too large: {size} bytes (max: {MAX_FILE_SIZE})"),
                &shown,
            ));
        }
        if size == 0 {
            return Err(RagflowError::file(format!("File is empty: {shown}"), &shown));
        }

        let bytes = tokio::fs::read(path).await.map_err(|err| {
            RagflowError::file(format!("Failed to read file: {err}"), &shown)
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        log::info!("Uploading file {display_name} ({size} bytes) to dataset {dataset_id}");
        let response = self
            .engine
            .request(
                Method::Post,
                &format!("/api/v1/datasets/{dataset_id}/documents"),
                RequestBody::Multipart(MultipartPayload {
                    file_name: display_name.to_string(),
                    content_type: content_type_for(&extension).to_string(),
                    bytes,
                    fields: vec![("chunk_method".to_string(), chunk_method.to_string())],
                }),
                &[],
            )
            .await?;

        let document = normalize::uploaded_document(&response)
            .ok_or_else(|| RagflowError::api("No document data returned from upload response"))?;
        let file_id = normalize::document_id(document)
            .ok_or_else(|| RagflowError::api("No file ID returned from upload response"))?;
        let chunk_count = document.get("chunk_count").and_then(Value::as_u64);

        let status = response
            .get("status")
            .and_then(Value::as_str)
            .map(OperationStatus::from_upstream)
            .unwrap_or(OperationStatus::Success);
        let mut message = normalize::response_message(&response)
            .map(str::to_string)
            .unwrap_or_else(|| format!("File {display_name} uploaded successfully"));
        log::info!("File uploaded successfully: {file_id}");

        if auto_process {
            match self.start_document_processing(dataset_id, &[&file_id]).await {
                Ok(()) => message.push_str(" and processing started"),
                Err(err) => {
                    log::warn!("Failed to start automatic processing for file {file_id}: {err}");
                    message.push_str(" (manual processing may be required)");
                }
            }
        }

        Ok(UploadOutcome {
            file_id,
            status,
            message,
            chunk_count,
        })
    }

    /// Replace a stored file's content and re-embed it.
    ///
    /// The upstream API has no in-place update, so this deletes the old
    /// document and re-uploads under the original display name. The returned
    /// `file_id` is the replacement's id; the old id is gone.
    pub async fn update_file(
        &self,
        file_id: &str,
        dataset_id: &str,
        file_path: &str,
    ) -> Result<UpdateOutcome> {
        let file_id = validate::string(file_id, "file_id", 1, 100)?;
        let dataset_id = validate::string(dataset_id, "dataset_id", 1, 100)?;
        let path = validate::file_path(file_path, "file_path")?;

        let listing = self.list_files(&dataset_id, STATUS_PROBE_LIMIT, 0).await?;
        let existing = listing
            .files
            .iter()
            .find(|record| record.file_id == file_id)
            .ok_or_else(|| {
                RagflowError::file(format!("File with ID {file_id} not found"), &file_id)
            })?;
        let original_name = existing.name.clone();

        log::info!("No in-place update upstream; deleting and re-uploading file {file_id}");
        let deleted = self.delete_file(&file_id, &dataset_id, true).await?;
        if deleted.status == DeleteStatus::Failed {
            log::warn!("Delete of old file {file_id} reported failure: {}", deleted.message);
        }

        let upload = self
            .upload_with_name(&path, &original_name, &dataset_id, "naive", false)
            .await?;
        let new_id = upload.file_id;
        let mut message = String::from("File updated successfully (deleted and re-uploaded)");

        // Re-embedding targets the replacement document. Auth rejections
        // propagate; anything else degrades to a caveat.
        match self.start_document_processing(&dataset_id, &[&new_id]).await {
            Ok(()) => {
                if self.wait_for_processing(&dataset_id, &new_id, REEMBED_WAIT).await {
                    log::info!("Re-processing completed for file {new_id}");
                    message.push_str(" and re-processed for embedding");
                } else {
                    log::warn!("Re-processing still in progress for file {new_id}");
                    message.push_str(" (re-processing in background)");
                }
            }
            Err(err) if err.is_auth_failure() => return Err(err),
            Err(err) => {
                log::warn!("Failed to start re-processing for file {new_id}: {err}");
                message.push_str(" (manual re-processing may be required)");
            }
        }

        Ok(UpdateOutcome {
            file_id: new_id,
            status: OperationStatus::Success,
            message,
            chunk_count: upload.chunk_count,
        })
    }

    /// Trigger chunking/embedding for already-uploaded documents.
    pub async fn start_document_processing(
        &self,
        dataset_id: &str,
        document_ids: &[&str],
    ) -> Result<()> {
        log::info!(
            "Starting processing for {} documents in dataset {dataset_id}",
            document_ids.len()
        );
        let response = self
            .engine
            .request(
                Method::Post,
                &format!("/api/v1/datasets/{dataset_id}/chunks"),
                RequestBody::Json(json!({ "document_ids": document_ids })),
                &[],
            )
            .await?;

        match normalize::response_code(&response) {
            Some(0) | None => Ok(()),
            Some(_) => {
                let detail = normalize::response_message(&response).unwrap_or("Unknown error");
                Err(RagflowError::api(format!(
                    "Failed to start document processing: {detail}"
                )))
            }
        }
    }

    /// Poll until the document reaches a terminal state or `timeout` passes.
    /// Returns whether processing completed successfully.
    pub async fn wait_for_processing(
        &self,
        dataset_id: &str,
        file_id: &str,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match self.get_file_status(file_id, Some(dataset_id)).await {
                Ok(snapshot) => match snapshot.status {
                    SnapshotStatus::Completed => {
                        log::info!("Document {file_id} processing completed");
                        return true;
                    }
                    SnapshotStatus::Failed => {
                        log::error!("Document {file_id} processing failed");
                        return false;
                    }
                    _ => tokio::time::sleep(POLL_INTERVAL).await,
                },
                Err(err) => {
                    log::warn!("Error checking status of {file_id}: {err}");
                    tokio::time::sleep(POLL_INTERVAL_AFTER_ERROR).await;
                }
            }
        }
        log::warn!(
            "Document {file_id} processing timeout after {}s",
            timeout.as_secs()
        );
        false
    }

    /// Retrieve chunks relevant to `query`, locally filtered by the
    /// similarity threshold, sorted best-first, and truncated to `limit`.
    pub async fn search(
        &self,
        query: &str,
        dataset_id: &str,
        limit: usize,
        similarity_threshold: f64,
        offset: u64,
    ) -> Result<SearchOutcome> {
        let query = validate::query(query, "query")?;
        let dataset_id = validate::string(dataset_id, "dataset_id", 1, 100)?;
        if limit == 0 || limit > 100 {
            return Err(RagflowError::validation(
                "limit must be between 1 and 100",
                "limit",
            ));
        }
        if !similarity_threshold.is_finite()
            || !(0.0..=1.0).contains(&similarity_threshold)
        {
            return Err(RagflowError::validation(
                "similarity_threshold must be between 0 and 1",
                "similarity_threshold",
            ));
        }

        log::info!("Searching dataset {dataset_id}");
        let started = std::time::Instant::now();
        let response = self
            .engine
            .request(
                Method::Post,
                "/api/v1/retrieval",
                RequestBody::Json(json!({
                    "question": query,
                    "dataset_ids": [dataset_id],
                    "limit": limit,
                    "similarity_threshold": similarity_threshold,
                    "offset": offset,
                })),
                &[],
            )
            .await?;
        let query_time_seconds = started.elapsed().as_secs_f64();

        // The upstream threshold is advisory; filter locally so the
        // guarantee holds regardless of server behavior. Stable sort keeps
        // upstream order among equal scores.
        let mut hits: Vec<_> = normalize::search_hits(&response)
            .into_iter()
            .filter(|hit| hit.score >= similarity_threshold)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);

        log::info!(
            "Search completed in {query_time_seconds:.2}s, found {} results",
            hits.len()
        );
        Ok(SearchOutcome {
            total_count: hits.len(),
            hits,
            query_time_seconds,
        })
    }

    /// List documents stored in a dataset, in upstream order.
    pub async fn list_files(
        &self,
        dataset_id: &str,
        limit: usize,
        offset: u64,
    ) -> Result<FileListOutcome> {
        let dataset_id = validate::string(dataset_id, "dataset_id", 1, 100)?;
        if limit == 0 || limit > 1000 {
            return Err(RagflowError::validation(
                "limit must be between 1 and 1000",
                "limit",
            ));
        }

        log::info!("Listing files in dataset {dataset_id}");
        let response = self
            .engine
            .request(
                Method::Get,
                &format!("/api/v1/datasets/{dataset_id}/documents"),
                RequestBody::Empty,
                &[
                    ("dataset_id".to_string(), dataset_id.clone()),
                    ("limit".to_string(), limit.to_string()),
                    ("offset".to_string(), offset.to_string()),
                ],
            )
            .await?;

        let (entries, total_count) = normalize::file_entries(&response);
        let files: Vec<FileRecord> = entries.iter().map(normalize::file_record).collect();
        log::info!("Found {} files in dataset {dataset_id}", files.len());
        Ok(FileListOutcome { files, total_count })
    }

    /// List all datasets visible to the configured credential.
    ///
    /// `limit` and `offset` are accepted for API symmetry with the other
    /// listings, but the upstream endpoint ignores pagination and returns
    /// the full set in one response; no local slicing is applied.
    pub async fn get_datasets(&self, limit: usize, offset: u64) -> Result<DatasetListOutcome> {
        log::info!("Getting list of datasets (limit {limit}, offset {offset})");
        let response = self
            .engine
            .request(Method::Get, "/api/v1/datasets", RequestBody::Empty, &[])
            .await?;

        match normalize::response_code(&response) {
            // 109 is the upstream's in-band credential rejection.
            Some(109) => {
                let detail = normalize::response_message(&response).unwrap_or("unknown");
                log::error!("Dataset listing rejected the credential: {detail}");
                return Err(RagflowError::Authentication);
            }
            Some(code) if code != 0 => {
                let detail = normalize::response_message(&response).unwrap_or("Unknown error");
                return Err(RagflowError::api(format!("API error (code {code}): {detail}")));
            }
            _ => {}
        }

        let (entries, total_count) = normalize::dataset_entries(&response);
        let datasets = entries.iter().map(normalize::dataset_record).collect::<Vec<_>>();
        log::info!("Found {} datasets", datasets.len());
        Ok(DatasetListOutcome {
            datasets,
            total_count,
        })
    }

    /// Delete a document. `confirm` must be true; a missing document is a
    /// `not_found` outcome rather than an error so deletion is idempotent
    /// from the caller's point of view.
    pub async fn delete_file(
        &self,
        file_id: &str,
        dataset_id: &str,
        confirm: bool,
    ) -> Result<DeleteOutcome> {
        let file_id = validate::string(file_id, "file_id", 1, 100)?;
        let dataset_id = validate::string(dataset_id, "dataset_id", 1, 100)?;
        if !confirm {
            return Err(RagflowError::validation(
                "Deletion must be confirmed by setting confirm=true",
                "confirm",
            ));
        }

        log::info!("Deleting file {file_id} from dataset {dataset_id}");
        let result = self
            .engine
            .request(
                Method::Delete,
                &format!("/api/v1/datasets/{dataset_id}/documents"),
                RequestBody::Json(json!({ "ids": [file_id] })),
                &[],
            )
            .await;

        match result {
            Ok(response) => {
                let code = normalize::response_code(&response).unwrap_or(0);
                let message = normalize::response_message(&response)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("File {file_id} deleted successfully"));
                let status = if code == 0 {
                    log::info!("File {file_id} deleted successfully");
                    DeleteStatus::Success
                } else {
                    log::error!("Delete of file {file_id} failed with code {code}: {message}");
                    DeleteStatus::Failed
                };
                Ok(DeleteOutcome {
                    file_id,
                    status,
                    message,
                })
            }
            Err(err) if err.status_code() == Some(404) => {
                log::warn!("File {file_id} not found for deletion");
                Ok(DeleteOutcome {
                    message: format!("File {file_id} not found"),
                    file_id,
                    status: DeleteStatus::NotFound,
                })
            }
            Err(err) => {
                log::error!("Failed to delete file {file_id}: {err}");
                Err(err)
            }
        }
    }

    /// Point-in-time processing status for a document.
    ///
    /// With a dataset id the lookup scans that dataset; without one it scans
    /// every visible dataset. A document that cannot be located, or a lookup
    /// that fails at the API level, yields an `unknown` snapshot instead of
    /// an error so polling loops stay alive. Authentication failures still
    /// propagate.
    pub async fn get_file_status(
        &self,
        file_id: &str,
        dataset_id: Option<&str>,
    ) -> Result<FileStatusSnapshot> {
        let file_id = validate::string(file_id, "file_id", 1, 100)?;
        log::debug!("Getting status for file {file_id}");

        let located = match dataset_id {
            Some(dataset_id) => self.locate_in_dataset(dataset_id, &file_id).await,
            None => self.locate_anywhere(&file_id).await,
        };

        match located {
            Ok(Some(record)) => Ok(snapshot_of(&file_id, &record)),
            Ok(None) => {
                log::warn!("File {file_id} not found in any searched dataset");
                Ok(FileStatusSnapshot::unknown(file_id))
            }
            Err(err) if matches!(err, RagflowError::Api { .. }) => {
                log::warn!("Status lookup for {file_id} failed: {err}");
                Ok(FileStatusSnapshot::unknown(file_id))
            }
            Err(err) => Err(err),
        }
    }

    async fn locate_in_dataset(
        &self,
        dataset_id: &str,
        file_id: &str,
    ) -> Result<Option<FileRecord>> {
        let listing = self.list_files(dataset_id, STATUS_PROBE_LIMIT, 0).await?;
        Ok(listing
            .files
            .into_iter()
            .find(|record| record.file_id == file_id))
    }

    async fn locate_anywhere(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let datasets = self.get_datasets(STATUS_PROBE_LIMIT, 0).await?;
        for dataset in &datasets.datasets {
            match self.locate_in_dataset(&dataset.dataset_id, file_id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                // An unreadable dataset must not hide the file in the next.
                Err(err) if matches!(err, RagflowError::Api { .. }) => {
                    log::debug!("Skipping dataset {}: {err}", dataset.dataset_id);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

fn snapshot_of(file_id: &str, record: &FileRecord) -> FileStatusSnapshot {
    let progress = match record.chunk_count {
        Some(count) if count > 0 => Some(1.0),
        _ => Some(0.0),
    };
    FileStatusSnapshot {
        file_id: file_id.to_string(),
        status: record.status.into(),
        progress,
        error_message: None,
        chunk_count: record.chunk_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RawResponse, TransportError};
    use crate::test_support::{http, ok, FakeTransport};
    use pretty_assertions::assert_eq;

    fn scripted(
        results: Vec<std::result::Result<RawResponse, TransportError>>,
    ) -> (RagflowClient, Arc<FakeTransport>) {
        let config = RagflowConfig::new("http://kb.test:9380", "test-key").unwrap();
        let transport = FakeTransport::new(results);
        let client = RagflowClient::with_transport(config, transport.clone());
        (client, transport)
    }

    fn temp_doc(name: &str, contents: &[u8]) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    fn multipart_of(body: &RequestBody) -> &MultipartPayload {
        match body {
            RequestBody::Multipart(payload) => payload,
            other => panic!("expected multipart body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_sends_multipart_and_starts_processing() {
        let (_dir, path) = temp_doc("notes.txt", b"knowledge");
        let (client, transport) = scripted(vec![
            ok(r#"{"code":0,"data":[{"id":"doc-1","chunk_count":4}]}"#),
            ok(r#"{"code":0}"#),
        ]);

        let outcome = client.upload_file(&path, "ds-1", "naive").await.unwrap();

        assert_eq!(outcome.file_id, "doc-1");
        assert_eq!(outcome.status, OperationStatus::Success);
        assert_eq!(outcome.chunk_count, Some(4));
        assert!(outcome.message.contains("uploaded successfully"));
        assert!(outcome.message.contains("processing started"));

        let requests = transport.requests.lock().await;
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.ends_with("/api/v1/datasets/ds-1/documents"));
        let payload = multipart_of(&requests[0].body);
        assert_eq!(payload.file_name, "notes.txt");
        assert_eq!(payload.content_type, "text/plain");
        assert_eq!(
            payload.fields,
            vec![("chunk_method".to_string(), "naive".to_string())]
        );
        assert!(requests[1].url.ends_with("/api/v1/datasets/ds-1/chunks"));
    }

    #[tokio::test]
    async fn upload_degrades_to_caveat_when_processing_start_fails() {
        let (_dir, path) = temp_doc("notes.txt", b"knowledge");
        let (client, _transport) = scripted(vec![
            ok(r#"{"code":0,"data":[{"id":"doc-1"}]}"#),
            ok(r#"{"code":102,"message":"no queue"}"#),
        ]);

        let outcome = client.upload_file(&path, "ds-1", "naive").await.unwrap();
        assert_eq!(outcome.file_id, "doc-1");
        assert!(outcome.message.contains("manual processing may be required"));
    }

    #[tokio::test]
    async fn upload_missing_file_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let (client, transport) = scripted(vec![]);

        let err = client
            .upload_file(&path.to_string_lossy(), "ds-1", "naive")
            .await
            .unwrap_err();

        assert!(matches!(err, RagflowError::File { .. }));
        assert!(err.to_string().contains("File not found"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_rejects_empty_file() {
        let (_dir, path) = temp_doc("empty.txt", b"");
        let (client, transport) = scripted(vec![]);

        let err = client.upload_file(&path, "ds-1", "naive").await.unwrap_err();
        assert!(err.to_string().contains("File is empty"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_rejects_unknown_chunk_method() {
        let (_dir, path) = temp_doc("notes.txt", b"x");
        let (client, transport) = scripted(vec![]);

        let err = client.upload_file(&path, "ds-1", "shred").await.unwrap_err();
        assert!(matches!(err, RagflowError::Validation { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_rejects_extensionless_file_before_any_request() {
        let (_dir, path) = temp_doc("README", b"plain notes");
        let (client, transport) = scripted(vec![]);

        let err = client.upload_file(&path, "ds-1", "naive").await.unwrap_err();
        assert!(matches!(err, RagflowError::Validation { .. }));
        assert!(err.to_string().contains("Unsupported file type"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_without_file_id_is_api_error() {
        let (_dir, path) = temp_doc("notes.txt", b"x");
        let (client, _transport) = scripted(vec![ok(r#"{"code":0,"data":[{"name":"n"}]}"#)]);

        let err = client.upload_file(&path, "ds-1", "naive").await.unwrap_err();
        assert!(err.to_string().contains("No file ID returned"));
    }

    #[tokio::test(start_paused = true)]
    async fn update_rotates_file_id_and_keeps_display_name() {
        let (_dir, path) = temp_doc("revised.txt", b"new content");
        let (client, transport) = scripted(vec![
            // existence probe, also recovers the original display name
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"doc-old","name":"guide.md","size":10,"run":"DONE","chunk_count":3}
            ],"total":1}}"#),
            // delete old
            ok(r#"{"code":0}"#),
            // re-upload
            ok(r#"{"code":0,"data":[{"id":"doc-new","chunk_count":5}]}"#),
            // re-embed trigger
            ok(r#"{"code":0}"#),
            // polling: first running, then done
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"doc-new","name":"guide.md","size":11,"run":"RUNNING","chunk_count":0}
            ],"total":1}}"#),
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"doc-new","name":"guide.md","size":11,"run":"DONE","chunk_count":5}
            ],"total":1}}"#),
        ]);

        let outcome = client.update_file("doc-old", "ds-1", &path).await.unwrap();

        assert_eq!(outcome.file_id, "doc-new");
        assert_eq!(outcome.status, OperationStatus::Success);
        assert_eq!(outcome.chunk_count, Some(5));
        assert!(outcome.message.contains("deleted and re-uploaded"));
        assert!(outcome.message.contains("re-processed for embedding"));

        let requests = transport.requests.lock().await;
        // Re-upload keeps the old display name, not the local file name.
        let payload = multipart_of(&requests[2].body);
        assert_eq!(payload.file_name, "guide.md");
        // Re-embed targets the replacement id.
        match &requests[3].body {
            RequestBody::Json(body) => assert_eq!(body["document_ids"][0], "doc-new"),
            other => panic!("expected json body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_unknown_file_is_an_error() {
        let (_dir, path) = temp_doc("revised.txt", b"new content");
        let (client, transport) =
            scripted(vec![ok(r#"{"code":0,"data":{"docs":[],"total":0}}"#)]);

        let err = client.update_file("ghost", "ds-1", &path).await.unwrap_err();
        assert!(matches!(err, RagflowError::File { .. }));
        assert!(err.to_string().contains("not found"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn update_propagates_auth_failure_from_reembed() {
        let (_dir, path) = temp_doc("revised.txt", b"new content");
        let (client, _transport) = scripted(vec![
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"doc-old","name":"a.txt","size":1,"run":"DONE","chunk_count":1}
            ],"total":1}}"#),
            ok(r#"{"code":0}"#),
            ok(r#"{"code":0,"data":[{"id":"doc-new"}]}"#),
            http(403, r#"{"message":"forbidden"}"#),
        ]);

        let err = client.update_file("doc-old", "ds-1", &path).await.unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn update_degrades_to_caveat_when_reembed_fails() {
        let (_dir, path) = temp_doc("revised.txt", b"new content");
        let (client, transport) = scripted(vec![
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"doc-old","name":"a.txt","size":1,"run":"DONE","chunk_count":1}
            ],"total":1}}"#),
            ok(r#"{"code":0}"#),
            ok(r#"{"code":0,"data":[{"id":"doc-new"}]}"#),
            http(500, r#"{"message":"queue down"}"#),
        ]);

        let outcome = client.update_file("doc-old", "ds-1", &path).await.unwrap();
        assert_eq!(outcome.file_id, "doc-new");
        assert!(outcome.message.contains("manual re-processing may be required"));
        // No polling after a failed trigger.
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn search_filters_sorts_and_truncates() {
        let (client, transport) = scripted(vec![ok(
            r#"{"code":0,"data":{"chunks":[
                {"content":"mid","similarity":0.4,"document_id":"f1","id":"c1"},
                {"content":"low","similarity":0.05,"document_id":"f2","id":"c2"},
                {"content":"best","similarity":0.9,"document_id":"f3","id":"c3"},
                {"content":"good","similarity":0.7,"document_id":"f4","id":"c4"}
            ]}}"#,
        )]);

        let outcome = client.search("what is rag", "ds-1", 2, 0.1, 0).await.unwrap();

        // 0.05 filtered out locally, remainder sorted best-first, cut to 2.
        assert_eq!(outcome.total_count, 2);
        let contents: Vec<&str> = outcome.hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["best", "good"]);

        let requests = transport.requests.lock().await;
        assert!(requests[0].url.ends_with("/api/v1/retrieval"));
        match &requests[0].body {
            RequestBody::Json(body) => {
                assert_eq!(body["question"], "what is rag");
                assert_eq!(body["dataset_ids"][0], "ds-1");
                assert_eq!(body["limit"], 2);
            }
            other => panic!("expected json body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_with_no_hits_is_empty() {
        let (client, _transport) = scripted(vec![ok(r#"{"code":0,"data":{"chunks":[]}}"#)]);
        let outcome = client.search("anything", "ds-1", 10, 0.1, 0).await.unwrap();
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.total_count, 0);
    }

    #[tokio::test]
    async fn search_keeps_upstream_order_among_equal_scores() {
        let (client, _transport) = scripted(vec![ok(
            r#"{"code":0,"data":{"chunks":[
                {"content":"first","similarity":0.5,"document_id":"f1","id":"c1"},
                {"content":"second","similarity":0.5,"document_id":"f2","id":"c2"},
                {"content":"third","similarity":0.5,"document_id":"f3","id":"c3"}
            ]}}"#,
        )]);

        let outcome = client.search("tied", "ds-1", 10, 0.1, 0).await.unwrap();

        let contents: Vec<&str> = outcome.hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn search_validates_ranges_before_any_request() {
        let (client, transport) = scripted(vec![]);

        let err = client.search("q", "ds-1", 0, 0.1, 0).await.unwrap_err();
        assert!(matches!(err, RagflowError::Validation { .. }));

        let err = client.search("q", "ds-1", 10, 1.5, 0).await.unwrap_err();
        assert!(matches!(err, RagflowError::Validation { .. }));

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn list_files_maps_entries_and_total() {
        let (client, transport) = scripted(vec![ok(
            r#"{"code":0,"data":{"docs":[
                {"id":"f1","name":"a.txt","size":100,"run":"DONE","chunk_count":2},
                {"id":"f2","name":"b.pdf","size":2000,"run":"RUNNING"}
            ],"total":17}}"#,
        )]);

        let outcome = client.list_files("ds-1", 100, 0).await.unwrap();
        assert_eq!(outcome.total_count, 17);
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.files[0].name, "a.txt");
        assert_eq!(outcome.files[1].status.as_str(), "processing");

        let requests = transport.requests.lock().await;
        assert!(requests[0]
            .query
            .contains(&("limit".to_string(), "100".to_string())));
    }

    #[tokio::test]
    async fn dataset_listing_maps_records() {
        let (client, _transport) = scripted(vec![ok(
            r#"{"code":0,"data":[
                {"id":"ds1","name":"Docs","description":"main","document_count":4},
                {"id":"ds2","title":"Archive"}
            ]}"#,
        )]);

        let outcome = client.get_datasets(100, 0).await.unwrap();
        assert_eq!(outcome.total_count, 2);
        assert_eq!(outcome.datasets[0].name, "Docs");
        assert_eq!(outcome.datasets[1].name, "Archive");
    }

    #[tokio::test]
    async fn dataset_listing_maps_code_109_to_authentication() {
        let (client, _transport) =
            scripted(vec![ok(r#"{"code":109,"message":"bad credential"}"#)]);
        let err = client.get_datasets(100, 0).await.unwrap_err();
        assert!(matches!(err, RagflowError::Authentication));
    }

    #[tokio::test]
    async fn dataset_listing_surfaces_other_error_codes() {
        let (client, _transport) = scripted(vec![ok(r#"{"code":5,"message":"busted"}"#)]);
        let err = client.get_datasets(100, 0).await.unwrap_err();
        assert!(err.to_string().contains("code 5"));
        assert!(err.to_string().contains("busted"));
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let (client, transport) = scripted(vec![]);
        let err = client.delete_file("f1", "ds-1", false).await.unwrap_err();
        assert!(matches!(err, RagflowError::Validation { field, .. } if field == "confirm"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn delete_maps_404_to_not_found_outcome() {
        let (client, _transport) = scripted(vec![http(404, r#"{"message":"no such doc"}"#)]);
        let outcome = client.delete_file("f1", "ds-1", true).await.unwrap();
        assert_eq!(outcome.status, DeleteStatus::NotFound);
        assert!(outcome.message.contains("not found"));
    }

    #[tokio::test]
    async fn delete_nonzero_code_is_failed_outcome() {
        let (client, _transport) = scripted(vec![ok(r#"{"code":3,"message":"locked"}"#)]);
        let outcome = client.delete_file("f1", "ds-1", true).await.unwrap();
        assert_eq!(outcome.status, DeleteStatus::Failed);
        assert_eq!(outcome.message, "locked");
    }

    #[tokio::test]
    async fn delete_success_uses_default_message() {
        let (client, _transport) = scripted(vec![ok(r#"{"code":0}"#)]);
        let outcome = client.delete_file("f1", "ds-1", true).await.unwrap();
        assert_eq!(outcome.status, DeleteStatus::Success);
        assert!(outcome.message.contains("deleted successfully"));
    }

    #[tokio::test]
    async fn file_status_found_in_dataset() {
        let (client, _transport) = scripted(vec![ok(
            r#"{"code":0,"data":{"docs":[
                {"id":"f1","name":"a.txt","size":100,"run":"DONE","chunk_count":6}
            ],"total":1}}"#,
        )]);

        let snapshot = client.get_file_status("f1", Some("ds-1")).await.unwrap();
        assert_eq!(snapshot.status, SnapshotStatus::Completed);
        assert_eq!(snapshot.progress, Some(1.0));
        assert_eq!(snapshot.chunk_count, Some(6));
    }

    #[tokio::test]
    async fn file_status_is_unknown_when_lookup_fails() {
        let (client, _transport) = scripted(vec![http(500, r#"{"message":"broken"}"#)]);
        let snapshot = client.get_file_status("f1", Some("ds-1")).await.unwrap();
        assert_eq!(snapshot.status, SnapshotStatus::Unknown);
        assert!(snapshot.progress.is_none());
    }

    #[tokio::test]
    async fn file_status_is_unknown_when_absent() {
        let (client, _transport) =
            scripted(vec![ok(r#"{"code":0,"data":{"docs":[],"total":0}}"#)]);
        let snapshot = client.get_file_status("ghost", Some("ds-1")).await.unwrap();
        assert_eq!(snapshot.status, SnapshotStatus::Unknown);
    }

    #[tokio::test]
    async fn file_status_scans_all_datasets_when_none_given() {
        let (client, transport) = scripted(vec![
            // dataset listing
            ok(r#"{"code":0,"data":[{"id":"ds1","name":"A"},{"id":"ds2","name":"B"}]}"#),
            // ds1 unreadable, must not abort the scan
            http(404, r#"{"message":"gone"}"#),
            // ds2 holds the file
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"f1","name":"a.txt","size":1,"run":"RUNNING"}
            ],"total":1}}"#),
        ]);

        let snapshot = client.get_file_status("f1", None).await.unwrap();
        assert_eq!(snapshot.status, SnapshotStatus::Processing);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn file_status_propagates_authentication() {
        let (client, _transport) = scripted(vec![http(401, "")]);
        let err = client.get_file_status("f1", Some("ds-1")).await.unwrap_err();
        assert!(matches!(err, RagflowError::Authentication));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_processing_polls_until_done() {
        let (client, transport) = scripted(vec![
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"f1","name":"a.txt","size":1,"run":"RUNNING"}
            ],"total":1}}"#),
            ok(r#"{"code":0,"data":{"docs":[
                {"id":"f1","name":"a.txt","size":1,"run":"DONE","chunk_count":2}
            ],"total":1}}"#,
        )]);

        assert!(
            client
                .wait_for_processing("ds-1", "f1", Duration::from_secs(60))
                .await
        );
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_processing_gives_up_at_deadline() {
        // Script exhaustion turns into transport errors, which the retry
        // engine converts to API errors; the poll loop rides those out
        // until the deadline.
        let (client, _transport) = scripted(vec![]);
        assert!(
            !client
                .wait_for_processing("ds-1", "f1", Duration::from_secs(10))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_processing_stops_on_failure() {
        let (client, _transport) = scripted(vec![ok(
            r#"{"code":0,"data":{"docs":[
                {"id":"f1","name":"a.txt","size":1,"run":"FAIL"}
            ],"total":1}}"#,
        )]);
        assert!(
            !client
                .wait_for_processing("ds-1", "f1", Duration::from_secs(60))
                .await
        );
    }

    #[test]
    fn content_types_cover_allowed_extensions() {
        assert_eq!(content_type_for("pdf"), "application/pdf");
        assert_eq!(content_type_for("md"), "text/markdown");
        assert_eq!(content_type_for("rtf"), "application/rtf");
        assert_eq!(content_type_for("weird"), "application/octet-stream");
    }
}
