//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// How the stages between source and sink are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Separate fetch and analyze pools, each behind its own gate
    #[default]
    Split,
    /// One pool whose tasks fetch and analyze, gated by `download_concurrency`
    Fused,
}

/// What happens when a single URL fails to download or decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// The first per-URL failure aborts the run
    #[default]
    FailFast,
    /// Per-URL failures are logged and counted, the run continues
    Skip,
}

/// Pipeline settings for concurrency and backpressure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max concurrent downloads
    pub download_concurrency: usize,

    /// Max concurrent decode + color analyses
    pub analysis_concurrency: usize,

    /// Capacity of each channel between stages
    pub buffer_size: usize,

    /// Stage layout
    pub mode: PipelineMode,

    /// Per-URL failure handling
    pub error_policy: ErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 8,
            analysis_concurrency: 4,
            buffer_size: 32,
            mode: PipelineMode::Split,
            error_policy: ErrorPolicy::FailFast,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,

    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: format!("tricolor/{}", crate::VERSION),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum response body size in megabytes
    pub max_download_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode + analysis timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_download_mb: 50,
            max_image_dimension: 20_000,
            decode_timeout_ms: 30_000,
        }
    }
}

impl LimitsConfig {
    /// Maximum response body size in bytes.
    pub fn max_download_bytes(&self) -> u64 {
        self.max_download_mb.saturating_mul(1024 * 1024)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
