//! Pipeline orchestration - wires together all processing stages.
//!
//! ```text
//! source ──urls──▶ fetch pool ──raw images──▶ analyze pool ──records──▶ sink
//!                  (gate D)                   (gate A)
//! ```
//!
//! In fused mode the two pools collapse into one, gated by D.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncBufRead;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, PipelineConfig, PipelineMode};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{RawImage, Record, RunStats};

use super::analyze::Analyzer;
use super::fetch::{HttpFetcher, ImageFetcher};
use super::pool::{bounded_channel, Stage, StageReport, WorkerPool};
use super::sink::{CsvSink, RowObserver};
use super::source::UrlSource;

/// The URL → CSV pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn ImageFetcher>,
    analyzer: Analyzer,
    observer: Option<RowObserver>,
}

impl Pipeline {
    /// Create a pipeline that fetches over HTTP.
    pub fn new(config: &Config) -> PipelineResult<Self> {
        let fetcher = HttpFetcher::new(&config.fetch, &config.limits)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a pipeline with a custom byte source.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            config: config.pipeline.clone(),
            fetcher,
            analyzer: Analyzer::new(config.limits.clone()),
            observer: None,
        }
    }

    /// Call `observer` after each row is flushed (progress display).
    pub fn on_row(mut self, observer: impl Fn(&Record) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Read URLs from `input` and write CSV rows to `output`.
    ///
    /// The input is opened before the output is created, so a missing URL
    /// list never truncates an existing output file.
    pub async fn run_files(
        &self,
        input: &Path,
        output: &Path,
    ) -> PipelineResult<RunStats> {
        let source = UrlSource::open(input).await?;
        let sink = CsvSink::create(output)?;
        self.run(source, sink).await
    }

    /// Run every stage to completion, or until the first failure.
    ///
    /// Rows arrive in completion order, which differs between runs. On
    /// failure the first error is returned straight away; stages still
    /// running are told to stop admitting work and left to wind down.
    pub async fn run<R, W>(
        &self,
        source: UrlSource<R>,
        sink: CsvSink<W>,
    ) -> PipelineResult<RunStats>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: std::io::Write + Send + 'static,
    {
        let start = Instant::now();
        let config = &self.config;
        let cancel = CancellationToken::new();
        tracing::info!(
            "Starting {:?} pipeline (downloads: {}, analyses: {}, policy: {:?})",
            config.mode,
            config.download_concurrency,
            config.analysis_concurrency,
            config.error_policy
        );

        let (url_tx, url_rx) = bounded_channel::<String>(config.buffer_size);
        let (record_tx, record_rx) = bounded_channel::<Record>(config.buffer_size);
        let mut stages: JoinSet<Result<StageReport, PipelineError>> = JoinSet::new();

        stages.spawn(source.run(url_tx, cancel.clone()));

        match config.mode {
            PipelineMode::Split => {
                let (raw_tx, raw_rx) = bounded_channel(config.buffer_size);
                let fetch_pool = WorkerPool::new(
                    Stage::Fetch,
                    url_rx,
                    raw_tx,
                    config.download_concurrency,
                    config.error_policy,
                    cancel.clone(),
                );
                let fetcher = Arc::clone(&self.fetcher);
                stages.spawn(fetch_pool.run(move |url: String| {
                    let fetcher = Arc::clone(&fetcher);
                    async move { fetch_one(fetcher.as_ref(), &url).await }
                }));

                let analyze_pool = WorkerPool::new(
                    Stage::Analyze,
                    raw_rx,
                    record_tx,
                    config.analysis_concurrency,
                    config.error_policy,
                    cancel.clone(),
                );
                let analyzer = self.analyzer.clone();
                stages.spawn(analyze_pool.run(move |raw| {
                    let analyzer = analyzer.clone();
                    async move { analyzer.analyze(raw).await }
                }));
            }
            PipelineMode::Fused => {
                let pool = WorkerPool::new(
                    Stage::FetchAnalyze,
                    url_rx,
                    record_tx,
                    config.download_concurrency,
                    config.error_policy,
                    cancel.clone(),
                );
                let fetcher = Arc::clone(&self.fetcher);
                let analyzer = self.analyzer.clone();
                stages.spawn(pool.run(move |url: String| {
                    let fetcher = Arc::clone(&fetcher);
                    let analyzer = analyzer.clone();
                    async move {
                        let raw = fetch_one(fetcher.as_ref(), &url).await?;
                        analyzer.analyze(raw).await
                    }
                }));
            }
        }

        let sink = match &self.observer {
            Some(observer) => sink.with_observer(Arc::clone(observer)),
            None => sink,
        };
        let sink_cancel = cancel.clone();
        stages.spawn_blocking(move || sink.run_blocking(record_rx, sink_cancel));

        let mut stats = RunStats::default();
        while let Some(joined) = stages.join_next().await {
            let failure = match joined {
                Ok(Ok(report)) => {
                    tracing::debug!(
                        "Stage {} finished: {} ok, {} skipped",
                        report.stage,
                        report.processed,
                        report.failed
                    );
                    stats.absorb(&report);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => PipelineError::TaskFailed {
                    stage: "pipeline".to_string(),
                    message: e.to_string(),
                },
            };
            cancel.cancel();
            stages.detach_all();
            tracing::error!("Aborting run: {}", failure);
            return Err(failure);
        }

        stats.elapsed = start.elapsed();
        tracing::info!(
            "Wrote {} rows from {} URLs in {:?} ({} skipped)",
            stats.rows_written,
            stats.urls_read,
            stats.elapsed,
            stats.failed
        );
        Ok(stats)
    }
}

async fn fetch_one(fetcher: &dyn ImageFetcher, url: &str) -> PipelineResult<RawImage> {
    let start = Instant::now();
    let raw = fetcher.fetch(url).await?;
    tracing::debug!(
        "Fetched {} via {} ({} bytes in {:?})",
        url,
        fetcher.name(),
        raw.bytes.len(),
        start.elapsed()
    );
    Ok(raw)
}

impl RunStats {
    fn absorb(&mut self, report: &StageReport) {
        match report.stage {
            Stage::Source => self.urls_read = report.processed,
            Stage::Fetch => self.fetched = report.processed,
            Stage::Analyze => self.analyzed = report.processed,
            Stage::FetchAnalyze => {
                self.fetched = report.processed;
                self.analyzed = report.processed;
            }
            Stage::Sink => self.rows_written = report.processed,
        }
        self.failed += report.failed;
    }
}
