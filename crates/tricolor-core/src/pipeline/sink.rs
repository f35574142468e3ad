//! CSV sink: appends one row per finished record, flushing every row.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::types::Record;

use super::pool::{Stage, StageReport};

/// Callback invoked after each row has been flushed.
pub type RowObserver = Arc<dyn Fn(&Record) + Send + Sync>;

/// Writes records as `url,primary,secondary,tertiary` rows.
///
/// Fields are quoted only when CSV requires it. Rows are written in arrival
/// order and flushed one at a time, so a failed run leaves every row that
/// completed before the failure on disk.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    path: PathBuf,
    observer: Option<RowObserver>,
}

impl CsvSink<File> {
    /// Create (or truncate) the output file.
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        let file = File::create(path).map_err(|e| PipelineError::Write {
            path: path.to_path_buf(),
            message: format!("Failed to create: {e}"),
        })?;
        Ok(Self::new(file, path))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap any writer. `path` is only used in error messages.
    pub fn new(writer: W, path: impl Into<PathBuf>) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        Self {
            writer,
            path: path.into(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: RowObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Write and flush a single record.
    pub fn write(&mut self, record: &Record) -> Result<(), PipelineError> {
        self.writer
            .write_record(record.to_row())
            .map_err(|e| self.write_error(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| self.write_error(e.to_string()))?;
        if let Some(observer) = &self.observer {
            observer(record);
        }
        Ok(())
    }

    fn write_error(&self, message: String) -> PipelineError {
        PipelineError::Write {
            path: self.path.clone(),
            message,
        }
    }

    /// Consume records until the channel closes or the run is cancelled.
    ///
    /// Blocks the calling thread; run it with `spawn_blocking`.
    pub fn run_blocking(
        mut self,
        mut input: mpsc::Receiver<Record>,
        cancel: CancellationToken,
    ) -> Result<StageReport, PipelineError> {
        let mut report = StageReport::new(Stage::Sink);

        while let Some(record) = input.blocking_recv() {
            if cancel.is_cancelled() {
                tracing::debug!("Sink cancelled, dropping {}", record.url);
                break;
            }
            self.write(&record)?;
            report.processed += 1;
            tracing::debug!("Wrote {}", record.url);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, ColorTriple};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(url: &str, rgb: [u8; 3]) -> Record {
        let color = Color::from_rgb(rgb[0], rgb[1], rgb[2]);
        Record {
            url: url.to_string(),
            colors: ColorTriple {
                primary: color,
                secondary: color,
                tertiary: color,
            },
        }
    }

    /// Writer that always fails, to exercise the error path.
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_rows_are_plain_csv() {
        let mut buffer = Vec::new();
        {
            let mut sink = CsvSink::new(&mut buffer, "out.csv");
            sink.write(&record("http://x/a.png", [255, 0, 0])).unwrap();
            sink.write(&record("http://x/b.png", [0, 0x0f, 0])).unwrap();
        }
        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(
            output,
            "http://x/a.png,#FF0000,#FF0000,#FF0000\nhttp://x/b.png,#000F00,#000F00,#000F00\n"
        );
    }

    #[test]
    fn test_fields_quoted_when_needed() {
        let mut buffer = Vec::new();
        {
            let mut sink = CsvSink::new(&mut buffer, "out.csv");
            sink.write(&record("http://x/a,b \"c\".png", [0, 0, 0])).unwrap();
        }
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.starts_with("\"http://x/a,b \"\"c\"\".png\",#000000"));
    }

    #[test]
    fn test_every_row_is_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path).unwrap();
        sink.write(&record("http://x/a.png", [1, 2, 3])).unwrap();

        // Readable while the sink is still alive.
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "http://x/a.png,#010203,#010203,#010203\n");
    }

    #[test]
    fn test_write_failure_is_write_error() {
        let mut sink = CsvSink::new(BrokenWriter, "broken.csv");
        let err = sink.write(&record("http://x/a.png", [0, 0, 0])).unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }));
        assert!(err.to_string().contains("broken.csv"));
    }

    #[tokio::test]
    async fn test_run_blocking_drains_channel_and_notifies() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(record("http://x/a.png", [255, 0, 0])).await.unwrap();
        tx.send(record("http://x/b.png", [0, 255, 0])).await.unwrap();
        drop(tx);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let sink = CsvSink::new(Vec::new(), "out.csv").with_observer(Arc::new(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let report = tokio::task::spawn_blocking(move || {
            sink.run_blocking(rx, CancellationToken::new())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_sink_writes_nothing() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(record("http://x/a.png", [255, 0, 0])).await.unwrap();
        drop(tx);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = CsvSink::new(Vec::new(), "out.csv");
        let report = tokio::task::spawn_blocking(move || sink.run_blocking(rx, cancel))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.processed, 0);
    }
}
