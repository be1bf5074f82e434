//! MCP tools for the RAGFlow knowledge base.
//!
//! Thin adapter between the MCP protocol and [`RagflowClient`]: each tool
//! validates its arguments, runs the gateway operation under an overall
//! timeout, and renders a plain-text summary. Operation failures come back
//! as `"Error: ..."` text content the calling model can read; credential
//! failures become protocol errors (see `errors`).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ragflow_client::models::DeleteStatus;
use ragflow_client::{
    sanitize_error_message, validate, RagflowClient, RagflowConfig, RagflowError,
};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::to_error_data;
use crate::render;

/// Hard ceiling on a single tool invocation.
const MAX_TOOL_TIMEOUT_SECS: u64 = 120;

/// RAGFlow MCP service.
#[derive(Clone)]
pub struct RagflowService {
    config: RagflowConfig,
    client: Arc<RagflowClient>,
    tool_router: ToolRouter<Self>,
}

impl RagflowService {
    pub fn new(config: RagflowConfig) -> Self {
        let client = Arc::new(RagflowClient::new(config.clone()));
        Self {
            config,
            client,
            tool_router: Self::tool_router(),
        }
    }

    /// Build the service over a pre-constructed client (tests).
    #[cfg(test)]
    pub(crate) fn with_client(config: RagflowConfig, client: RagflowClient) -> Self {
        Self {
            config,
            client: Arc::new(client),
            tool_router: Self::tool_router(),
        }
    }

    fn tool_timeout(&self) -> Duration {
        Duration::from_secs((self.config.timeout_secs * 2).min(MAX_TOOL_TIMEOUT_SECS))
    }

    /// Dataset id from the request, falling back to the configured default.
    fn resolve_dataset(&self, requested: Option<String>) -> Result<String, RagflowError> {
        match requested {
            Some(dataset_id) => validate::string(&dataset_id, "dataset_id", 1, 100),
            None => self.config.default_dataset_id.clone().ok_or_else(|| {
                RagflowError::validation(
                    "dataset_id is required (no default dataset is configured)",
                    "dataset_id",
                )
            }),
        }
    }

    fn failure(err: &RagflowError) -> CallToolResult {
        CallToolResult::error(vec![Content::text(format!(
            "Error: {}",
            sanitize_error_message(&err.to_string())
        ))])
    }

    /// Run one tool operation under the overall timeout and turn its result
    /// into MCP content.
    async fn run_tool<F>(&self, name: &str, operation: F) -> Result<CallToolResult, McpError>
    where
        F: Future<Output = Result<String, RagflowError>>,
    {
        let timeout = self.tool_timeout();
        match tokio::time::timeout(timeout, operation).await {
            Ok(Ok(text)) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Ok(Err(err)) if err.is_auth_failure() => {
                log::error!("Tool {name} failed: {err}");
                Err(to_error_data(&err))
            }
            Ok(Err(err)) => {
                log::error!("Tool {name} failed: {err}");
                Ok(Self::failure(&err))
            }
            Err(_) => {
                log::error!("Tool {name} timed out after {}s", timeout.as_secs());
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error: Operation timed out after {} seconds. \
                     Please try again or check your connection.",
                    timeout.as_secs()
                ))]))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for RagflowService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "RAGFlow knowledge-base tools. Use 'ragflow_get_datasets' to discover \
                 datasets, 'ragflow_upload_file' to add documents, 'ragflow_search' for \
                 semantic retrieval, 'ragflow_list_files' to inspect a dataset, \
                 'ragflow_update_file' to replace a document, and 'ragflow_delete_file' \
                 (with confirm=true) to remove one."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

// Numeric fields are declared as raw JSON values so that integer-valued
// floats and numeric strings coerce instead of failing schema-strict hosts;
// the schema still advertises the numeric type.

fn opt_integer(
    value: Option<&Value>,
    name: &str,
    min: Option<i64>,
    max: Option<i64>,
    default: i64,
) -> Result<i64, RagflowError> {
    match value {
        Some(raw) => validate::integer(raw, name, min, max),
        None => Ok(default),
    }
}

fn opt_float(
    value: Option<&Value>,
    name: &str,
    min: f64,
    max: f64,
    default: f64,
) -> Result<f64, RagflowError> {
    match value {
        Some(raw) => validate::float(raw, name, Some(min), Some(max)),
        None => Ok(default),
    }
}

// ============================================================================
// Tool Input Schemas
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UploadFileRequest {
    #[schemars(description = "Path to the local file to upload")]
    pub file_path: String,

    #[schemars(description = "Target dataset ID (defaults to the configured default dataset)")]
    pub dataset_id: Option<String>,

    #[schemars(description = "Document chunking strategy, e.g. naive, qa, paper (default: naive)")]
    pub chunk_method: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateFileRequest {
    #[schemars(description = "ID of the document to replace")]
    pub file_id: String,

    #[schemars(description = "Path to the local file with the new content")]
    pub file_path: String,

    #[schemars(description = "Dataset ID containing the document (defaults to the configured default dataset)")]
    pub dataset_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Natural-language search query")]
    pub query: String,

    #[schemars(description = "Dataset ID to search (defaults to the configured default dataset)")]
    pub dataset_id: Option<String>,

    #[schemars(with = "Option<i64>", description = "Maximum results to return, 1-100 (default: 10)")]
    pub limit: Option<Value>,

    #[schemars(with = "Option<f64>", description = "Minimum similarity score, 0.0-1.0 (default: 0.1)")]
    pub similarity_threshold: Option<Value>,

    #[schemars(with = "Option<i64>", description = "Results to skip for pagination (default: 0)")]
    pub offset: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListFilesRequest {
    #[schemars(description = "Dataset ID to list (defaults to the configured default dataset)")]
    pub dataset_id: Option<String>,

    #[schemars(with = "Option<i64>", description = "Maximum files to return, 1-1000 (default: 100)")]
    pub limit: Option<Value>,

    #[schemars(with = "Option<i64>", description = "Files to skip for pagination (default: 0)")]
    pub offset: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteFileRequest {
    #[schemars(description = "ID of the document to delete")]
    pub file_id: String,

    #[schemars(description = "Dataset ID containing the document (defaults to the configured default dataset)")]
    pub dataset_id: Option<String>,

    #[schemars(description = "Must be true to actually delete; guards against accidental deletion")]
    pub confirm: Option<bool>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct GetDatasetsRequest {
    #[schemars(with = "Option<i64>", description = "Maximum datasets to return, 1-1000 (default: 100); the upstream endpoint may ignore pagination")]
    pub limit: Option<Value>,

    #[schemars(with = "Option<i64>", description = "Datasets to skip for pagination (default: 0)")]
    pub offset: Option<Value>,
}

// ============================================================================
// Tools
// ============================================================================

#[tool_router]
impl RagflowService {
    /// Upload a document and start embedding
    #[tool(
        name = "ragflow_upload_file",
        description = "Upload a local document to a RAGFlow dataset and start chunking/embedding. Supported types: txt, pdf, doc, docx, md, html, csv, json, xml, rtf."
    )]
    pub async fn upload_file(
        &self,
        Parameters(request): Parameters<UploadFileRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("ragflow_upload_file", async {
            let dataset_id = self.resolve_dataset(request.dataset_id)?;
            let chunk_method = request.chunk_method.as_deref().unwrap_or("naive");

            let outcome = self
                .client
                .upload_file(&request.file_path, &dataset_id, chunk_method)
                .await?;

            let mut text = format!(
                "✅ File uploaded successfully!\n\
                 📄 File ID: {}\n\
                 📊 Status: {}\n\
                 💬 Message: {}",
                outcome.file_id,
                outcome.status.as_str(),
                outcome.message
            );
            if let Some(chunks) = outcome.chunk_count {
                text.push_str(&format!("\n🔢 Chunks created: {chunks}"));
            }
            Ok(text)
        })
        .await
    }

    /// Replace a document's content and re-embed it
    #[tool(
        name = "ragflow_update_file",
        description = "Replace a stored document's content with a local file and re-embed it. The document gets a new file ID; use the ID from the response afterwards."
    )]
    pub async fn update_file(
        &self,
        Parameters(request): Parameters<UpdateFileRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("ragflow_update_file", async {
            let dataset_id = self.resolve_dataset(request.dataset_id)?;

            let outcome = self
                .client
                .update_file(&request.file_id, &dataset_id, &request.file_path)
                .await?;

            let mut text = format!(
                "✅ File updated successfully!\n\
                 📄 File ID: {}\n\
                 📊 Status: {}\n\
                 💬 Message: {}",
                outcome.file_id,
                outcome.status.as_str(),
                outcome.message
            );
            if let Some(chunks) = outcome.chunk_count {
                text.push_str(&format!("\n🔢 Chunks updated: {chunks}"));
            }
            Ok(text)
        })
        .await
    }

    /// Semantic search over a dataset
    #[tool(
        name = "ragflow_search",
        description = "Search a RAGFlow dataset with a natural-language query. Returns the most relevant chunks with similarity scores and source files."
    )]
    pub async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("ragflow_search", async {
            let dataset_id = self.resolve_dataset(request.dataset_id)?;
            let limit = opt_integer(request.limit.as_ref(), "limit", Some(1), Some(100), 10)?;
            let threshold = opt_float(
                request.similarity_threshold.as_ref(),
                "similarity_threshold",
                0.0,
                1.0,
                0.1,
            )?;
            let offset = opt_integer(request.offset.as_ref(), "offset", Some(0), None, 0)?;

            let outcome = self
                .client
                .search(
                    &request.query,
                    &dataset_id,
                    limit as usize,
                    threshold,
                    offset as u64,
                )
                .await?;

            if outcome.hits.is_empty() {
                return Ok("🔍 No results found for your query.\n\n\
                           Try:\n\
                           • Using different keywords\n\
                           • Lowering the similarity threshold\n\
                           • Checking if the dataset contains relevant content"
                    .to_string());
            }

            let mut text = format!(
                "🔍 Found {} results (showing top {}):\n\n",
                outcome.total_count,
                outcome.hits.len()
            );
            for (index, hit) in outcome.hits.iter().enumerate() {
                text.push_str(&format!(
                    "{}. 📊 Score: {:.3}\n   📄 File: {}\n   📝 Content: {}\n\n",
                    index + 1,
                    hit.score,
                    hit.file_name,
                    render::clip_content(&hit.content, 200)
                ));
            }
            text.push_str(&format!("⏱️ Query time: {:.3}s", outcome.query_time_seconds));
            Ok(text)
        })
        .await
    }

    /// List documents in a dataset
    #[tool(
        name = "ragflow_list_files",
        description = "List the documents stored in a RAGFlow dataset with size, creation time, processing status, and chunk counts."
    )]
    pub async fn list_files(
        &self,
        Parameters(request): Parameters<ListFilesRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("ragflow_list_files", async {
            let dataset_id = self.resolve_dataset(request.dataset_id)?;
            let limit = opt_integer(request.limit.as_ref(), "limit", Some(1), Some(1000), 100)?;
            let offset = opt_integer(request.offset.as_ref(), "offset", Some(0), None, 0)?;

            let outcome = self
                .client
                .list_files(&dataset_id, limit as usize, offset as u64)
                .await?;

            if outcome.files.is_empty() {
                return Ok("📂 No files found in the dataset.\n\n\
                           Try uploading some files first using the ragflow_upload_file tool."
                    .to_string());
            }

            let mut text = format!("📂 Found {} files", outcome.files.len());
            if outcome.total_count > outcome.files.len() as u64 {
                text.push_str(&format!(
                    " (showing {} of {} total)",
                    outcome.files.len(),
                    outcome.total_count
                ));
            }
            text.push_str(":\n\n");

            for (index, file) in outcome.files.iter().enumerate() {
                text.push_str(&format!(
                    "{}. 📄 {}\n   🆔 ID: {}\n   📏 Size: {}\n   📅 Created: {}\n   📊 Status: {}\n",
                    index + 1,
                    file.name,
                    file.file_id,
                    render::human_size(file.size_bytes),
                    file.created_at.format("%Y-%m-%d %H:%M:%S"),
                    file.status.as_str(),
                ));
                if let Some(chunks) = file.chunk_count.filter(|count| *count > 0) {
                    text.push_str(&format!("   🔢 Chunks: {chunks}\n"));
                }
                text.push('\n');
            }
            Ok(text)
        })
        .await
    }

    /// Delete a document
    #[tool(
        name = "ragflow_delete_file",
        description = "Delete a document from a RAGFlow dataset. Requires confirm=true; deleting an already-missing document reports not_found rather than failing."
    )]
    pub async fn delete_file(
        &self,
        Parameters(request): Parameters<DeleteFileRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("ragflow_delete_file", async {
            let dataset_id = self.resolve_dataset(request.dataset_id)?;
            let confirm = request.confirm.unwrap_or(false);

            let outcome = self
                .client
                .delete_file(&request.file_id, &dataset_id, confirm)
                .await?;

            let headline = match outcome.status {
                DeleteStatus::Success => "🗑️ File deleted successfully!",
                DeleteStatus::NotFound => "🗑️ File not found (nothing to delete).",
                DeleteStatus::Failed => "🗑️ Delete failed upstream.",
            };
            Ok(format!(
                "{headline}\n📄 File ID: {}\n📊 Status: {}\n💬 Message: {}",
                outcome.file_id,
                outcome.status.as_str(),
                outcome.message
            ))
        })
        .await
    }

    /// List available datasets
    #[tool(
        name = "ragflow_get_datasets",
        description = "List the datasets available in the RAGFlow instance with their IDs, descriptions, and file counts."
    )]
    pub async fn get_datasets(
        &self,
        Parameters(request): Parameters<GetDatasetsRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool("ragflow_get_datasets", async {
            let limit = opt_integer(request.limit.as_ref(), "limit", Some(1), Some(1000), 100)?;
            let offset = opt_integer(request.offset.as_ref(), "offset", Some(0), None, 0)?;

            let outcome = self.client.get_datasets(limit as usize, offset as u64).await?;

            if outcome.datasets.is_empty() {
                return Ok("📊 No datasets found.\n\n\
                           You may need to create a dataset first in your RAGFlow instance."
                    .to_string());
            }

            let mut text = format!("📊 Found {} datasets", outcome.datasets.len());
            if outcome.total_count > outcome.datasets.len() as u64 {
                text.push_str(&format!(
                    " (showing {} of {} total)",
                    outcome.datasets.len(),
                    outcome.total_count
                ));
            }
            text.push_str(":\n\n");

            for (index, dataset) in outcome.datasets.iter().enumerate() {
                let description = dataset.description.as_deref().unwrap_or("No description");
                text.push_str(&format!(
                    "{}. 📁 {}\n   🆔 ID: {}\n   📝 Description: {}\n   📄 Files: {}\n",
                    index + 1,
                    dataset.name,
                    dataset.dataset_id,
                    render::clip_description(description, 100),
                    dataset.file_count,
                ));
                if let Some(created) = dataset.created_at {
                    text.push_str(&format!(
                        "   📅 Created: {}\n",
                        created.format("%Y-%m-%d %H:%M:%S")
                    ));
                }
                text.push('\n');
            }
            Ok(text)
        })
        .await
    }
}
