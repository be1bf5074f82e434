use crate::error::{RagflowError, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Connection settings for the upstream knowledge-base API.
///
/// Read-only after startup; shared by reference across concurrent tool calls.
#[derive(Debug, Clone)]
pub struct RagflowConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub api_key: String,
    pub default_dataset_id: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts after the first, for transport-level failures only.
    pub max_retries: u32,
}

impl RagflowConfig {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let config = Self {
            base_url: normalize_base_url(base_url)?,
            api_key: normalize_api_key(api_key)?,
            default_dataset_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `RAGFLOW_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url = require_env("RAGFLOW_BASE_URL")?;
        let api_key = require_env("RAGFLOW_API_KEY")?;

        let mut config = Self::new(&base_url, &api_key)?;
        config.default_dataset_id = optional_env("RAGFLOW_DEFAULT_DATASET_ID");

        if let Some(raw) = optional_env("RAGFLOW_TIMEOUT") {
            config.timeout_secs = raw.parse().map_err(|err| {
                RagflowError::configuration(format!("Invalid RAGFLOW_TIMEOUT value: {err}"))
            })?;
        }
        if let Some(raw) = optional_env("RAGFLOW_MAX_RETRIES") {
            config.max_retries = raw.parse().map_err(|err| {
                RagflowError::configuration(format!("Invalid RAGFLOW_MAX_RETRIES value: {err}"))
            })?;
        }

        config.validate()?;
        log::info!(
            "Configuration loaded: base_url={}, timeout={}s",
            config.base_url,
            config.timeout_secs
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(RagflowError::configuration("timeout must be greater than 0"));
        }
        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RagflowError::configuration("base_url cannot be empty"));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(RagflowError::configuration(
            "base_url must start with http:// or https://",
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn normalize_api_key(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RagflowError::configuration("api_key cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn require_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| {
        RagflowError::configuration(format!("{name} environment variable is required"))
    })
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
