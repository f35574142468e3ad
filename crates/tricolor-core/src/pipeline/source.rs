//! URL source: streams lines of the input list into the pipeline.

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

use super::pool::{Stage, StageReport};

/// Reads newline-delimited URLs, one per line, in input order.
///
/// Line terminators are stripped; nothing else is. Empty lines are passed on
/// like any other URL.
pub struct UrlSource<R> {
    reader: R,
    path: PathBuf,
}

impl UrlSource<BufReader<File>> {
    /// Open a URL list on disk.
    pub async fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).await.map_err(|e| PipelineError::Source {
            path: path.to_path_buf(),
            message: format!("Failed to open: {e}"),
        })?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R> UrlSource<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wrap any buffered reader. `path` is only used in error messages.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
        }
    }

    /// Send every line to `output` until the input ends, a read fails, the
    /// run is cancelled, or nobody is listening any more.
    ///
    /// `output` is dropped on return, which closes the channel downstream.
    pub async fn run(
        self,
        output: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(Stage::Source);
        let mut lines = self.reader.lines();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            let url = match line {
                Ok(Some(url)) => url,
                Ok(None) => break,
                Err(e) => {
                    return Err(PipelineError::Source {
                        path: self.path,
                        message: format!("Read failed after {} lines: {e}", report.processed),
                    })
                }
            };
            if output.send(url).await.is_err() {
                tracing::debug!("URL channel closed, source stopping early");
                break;
            }
            report.processed += 1;
        }

        tracing::debug!("Source finished after {} URLs", report.processed);
        Ok(report)
    }
}
