//! Tricolor Core - concurrent dominant-color extraction.
//!
//! Tricolor reads a list of image URLs, downloads each image, finds its three
//! most frequent colors and appends one CSV row per image:
//!
//! ```text
//! urls.txt → Source → Fetch (×D) → Analyze (×A) → Sink → colors.csv
//! ```
//!
//! Every stage is connected by a bounded channel, so memory use stays flat
//! however long the URL list is. Rows are written in completion order.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tricolor_core::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> tricolor_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::new(&config)?;
//!
//!     let stats = pipeline.run_files("urls.txt".as_ref(), "colors.csv".as_ref()).await?;
//!     println!("Wrote {} rows", stats.rows_written);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::{Config, ErrorPolicy, PipelineMode};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, TricolorError};
pub use pipeline::{dominant_colors, CsvSink, ImageFetcher, Pipeline, UrlSource};
pub use types::{Color, ColorTriple, RawImage, Record, RunStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
