//! Typed client for a RAGFlow-style knowledge-base HTTP API.
//!
//! The [`RagflowClient`] gateway exposes one method per logical operation
//! (upload, update, search, list, delete, status) on top of a retrying
//! request engine. Responses arrive in several upstream shapes; the
//! `normalize` module folds them into the canonical records in `models`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod normalize;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use client::{RagflowClient, MAX_FILE_SIZE};
pub use config::RagflowConfig;
pub use error::{sanitize_error_message, RagflowError, Result};
