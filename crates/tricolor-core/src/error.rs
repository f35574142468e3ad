//! Error types for the tricolor pipeline.
//!
//! Errors are organized by stage so the message names the stage and the URL
//! (or file) that failed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tricolor operations.
#[derive(Error, Debug)]
pub enum TricolorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The URL list could not be opened or read
    #[error("Failed to read URL list {path}: {message}")]
    Source { path: PathBuf, message: String },

    /// Fetching an image failed
    #[error("Error downloading {url}: {message}")]
    Download { url: String, message: String },

    /// The downloaded bytes are not a decodable image
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },

    /// The CSV output could not be created or written
    #[error("Error writing to {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// A stage or worker task panicked or was cancelled by the runtime
    #[error("Task failed in {stage} stage: {message}")]
    TaskFailed { stage: String, message: String },
}

impl PipelineError {
    /// Whether this error belongs to a single URL rather than the whole run.
    ///
    /// Only per-URL errors may be skipped under the `skip` error policy.
    pub fn is_per_url(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Decode { .. })
    }
}

/// Convenience type alias for tricolor results.
pub type Result<T> = std::result::Result<T, TricolorError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
