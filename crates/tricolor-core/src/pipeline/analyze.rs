//! Analyze job: decode a fetched image and rank its colors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::types::{RawImage, Record};

use super::decode::{format_to_string, ImageDecoder};
use super::palette::dominant_colors;

/// Turns a [`RawImage`] into a [`Record`].
///
/// Decoding and the pixel scan are CPU-bound, so both run on the blocking
/// thread pool under a timeout. Clones share one count of running analyses.
#[derive(Debug, Clone)]
pub struct Analyzer {
    decoder: ImageDecoder,
    running: Arc<AtomicUsize>,
}

/// Decrements the running count when a blocking analysis ends, however it ends.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Analyzer {
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            decoder: ImageDecoder::new(limits),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Blocking analyses currently executing, timed out ones included.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Decode `raw` and rank its colors.
    ///
    /// Does not return before the blocking work has ended, even after a
    /// timeout: a decode cannot be interrupted, and the caller's admission
    /// slot must stay taken while it runs.
    pub async fn analyze(&self, raw: RawImage) -> Result<Record, PipelineError> {
        let url = raw.url.clone();
        let timeout_ms = self.decoder.limits().decode_timeout_ms;
        let decoder = self.decoder.clone();

        self.running.fetch_add(1, Ordering::SeqCst);
        let guard = RunningGuard(Arc::clone(&self.running));
        let mut handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            Self::analyze_sync(&decoder, raw)
        });

        let joined = match timeout(Duration::from_millis(timeout_ms), &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(
                    "Analysis of {} exceeded {}ms, waiting for it to stop ({} running)",
                    url,
                    timeout_ms,
                    self.running()
                );
                let _ = handle.await;
                return Err(PipelineError::Decode {
                    url,
                    message: format!("timed out after {}ms", timeout_ms),
                });
            }
        };

        joined.unwrap_or_else(|e| {
            Err(PipelineError::TaskFailed {
                stage: "analyze".to_string(),
                message: format!("Task join error for {}: {}", url, e),
            })
        })
    }

    /// Synchronous decode + scan (runs in spawn_blocking).
    fn analyze_sync(decoder: &ImageDecoder, raw: RawImage) -> Result<Record, PipelineError> {
        let start = Instant::now();
        let decoded = decoder.decode(&raw.bytes, &raw.url)?;
        let decode_time = start.elapsed();

        let colors = dominant_colors(&decoded.image).ok_or_else(|| PipelineError::Decode {
            url: raw.url.clone(),
            message: "image has no pixels".to_string(),
        })?;

        tracing::trace!(
            "  Analyzed {} ({} {}x{}) decode {:?}, total {:?}",
            raw.url,
            format_to_string(decoded.format),
            decoded.width,
            decoded.height,
            decode_time,
            start.elapsed()
        );

        Ok(Record {
            url: raw.url,
            colors,
        })
    }
}
