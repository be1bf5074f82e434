//! RAGFlow MCP Server
//!
//! Exposes a RAGFlow knowledge base to AI agents via the MCP protocol.
//!
//! ## Tools
//!
//! - `ragflow_upload_file` - Upload a local document and start embedding
//! - `ragflow_update_file` - Replace a stored document's content and re-embed
//! - `ragflow_search` - Semantic search over a dataset
//! - `ragflow_list_files` - List documents stored in a dataset
//! - `ragflow_delete_file` - Delete a document (requires confirmation)
//! - `ragflow_get_datasets` - List available datasets
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "ragflow": {
//!       "command": "ragflow-mcp",
//!       "env": {
//!         "RAGFLOW_BASE_URL": "http://localhost:9380",
//!         "RAGFLOW_API_KEY": "..."
//!       }
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use ragflow_client::RagflowConfig;
use rmcp::transport::stdio;
use rmcp::ServiceExt;

mod errors;
mod render;
mod tools;

#[cfg(test)]
mod test_support;

use tools::RagflowService;

#[tokio::main]
async fn main() -> Result<()> {
    // Configure logging to stderr only (stdout is for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting RAGFlow MCP server");

    let config = RagflowConfig::from_env()?;

    // Create and start the MCP server
    let service = RagflowService::new(config);
    let server = service.serve(stdio()).await?;

    // Wait for shutdown
    server.waiting().await?;

    log::info!("RAGFlow MCP server stopped");
    Ok(())
}
