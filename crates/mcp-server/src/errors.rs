//! Mapping from client errors to JSON-RPC protocol errors.
//!
//! Most tool failures are rendered as `"Error: ..."` text content so the
//! calling model can read and react to them. Credential problems are the
//! exception: the model cannot fix a bad API key, so those surface as
//! protocol-level errors for the host to handle. Every message is sanitized
//! before it crosses the boundary.

use ragflow_client::{sanitize_error_message, RagflowError};
use rmcp::model::ErrorCode;
use rmcp::ErrorData;

/// Convert a client error into a JSON-RPC error response.
pub fn to_error_data(err: &RagflowError) -> ErrorData {
    match err {
        RagflowError::Configuration { .. }
        | RagflowError::Validation { .. }
        | RagflowError::File { .. } => ErrorData::new(
            ErrorCode::INVALID_PARAMS,
            sanitize_error_message(&err.to_string()),
            None,
        ),
        RagflowError::Authentication => {
            ErrorData::new(ErrorCode::INVALID_REQUEST, "Authentication failed", None)
        }
        RagflowError::Api { status_code, .. } => match status_code {
            Some(404) => ErrorData::new(ErrorCode::INVALID_PARAMS, "Resource not found", None),
            Some(401) => {
                ErrorData::new(ErrorCode::INVALID_REQUEST, "Authentication failed", None)
            }
            Some(403) => ErrorData::new(ErrorCode::INVALID_REQUEST, "Access denied", None),
            Some(429) => ErrorData::new(ErrorCode::INVALID_REQUEST, "Rate limit exceeded", None),
            _ => ErrorData::new(
                ErrorCode::INTERNAL_ERROR,
                sanitize_error_message(&err.to_string()),
                None,
            ),
        },
    }
}
