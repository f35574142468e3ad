//! Pipeline components.
//!
//! This module contains all the stages of the URL → colors pipeline:
//! - **source**: Stream URLs from the input list
//! - **fetch**: Download image bytes over HTTP
//! - **decode**: Sniff the format and decode with size limits
//! - **palette**: Count pixel colors and keep the top three
//! - **analyze**: Decode + palette on the blocking pool
//! - **sink**: Append CSV rows, one flush per row
//! - **pool**: Bounded channels and gated worker pools
//! - **processor**: Wires the stages together

pub mod analyze;
pub mod decode;
pub mod fetch;
pub mod palette;
pub mod pool;
pub mod processor;
pub mod sink;
pub mod source;

// Re-exports for convenient access
pub use analyze::Analyzer;
pub use decode::{DecodedImage, ImageDecoder};
pub use fetch::{HttpFetcher, ImageFetcher};
pub use palette::{dominant_colors, ColorCounter};
pub use pool::{bounded_channel, Stage, StageReport, WorkerPool};
pub use processor::Pipeline;
pub use sink::{CsvSink, RowObserver};
pub use source::UrlSource;
