//! Bounded channels and gated worker pools.
//!
//! A [`WorkerPool`] pulls items from its input channel, takes a slot from its
//! admission gate, and spawns one task per item. The task holds the slot
//! until its result has been handed to the output channel, so a full
//! downstream channel holds back admission upstream.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::ErrorPolicy;
use crate::error::PipelineError;

/// Create a bounded channel pair.
///
/// When the buffer is full the sender waits, which is what keeps memory
/// bounded no matter how long the URL list is.
pub fn bounded_channel<T>(buffer_size: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(buffer_size)
}

/// Pipeline stages, for reports and log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Source,
    Fetch,
    Analyze,
    /// Fetch and analyze in one task (fused mode)
    FetchAnalyze,
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Source => "source",
            Stage::Fetch => "fetch",
            Stage::Analyze => "analyze",
            Stage::FetchAnalyze => "fetch+analyze",
            Stage::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// What a stage did before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    /// Items completed successfully
    pub processed: u64,
    /// Items dropped under the skip policy
    pub failed: u64,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            processed: 0,
            failed: 0,
        }
    }
}

/// A gated pool of per-item tasks between two channels.
pub struct WorkerPool<I, O> {
    stage: Stage,
    input: mpsc::Receiver<I>,
    output: mpsc::Sender<O>,
    gate: Arc<Semaphore>,
    policy: ErrorPolicy,
    cancel: CancellationToken,
}

impl<I, O> WorkerPool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a pool admitting at most `concurrency` tasks at once.
    pub fn new(
        stage: Stage,
        input: mpsc::Receiver<I>,
        output: mpsc::Sender<O>,
        concurrency: usize,
        policy: ErrorPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stage,
            input,
            output,
            gate: Arc::new(Semaphore::new(concurrency)),
            policy,
            cancel,
        }
    }

    /// Run the dispatcher until the input closes or the run is cancelled.
    ///
    /// `job` is called once per item inside its own task. An `Err` from a job
    /// (or a panicking task) fails the stage, except for per-URL errors under
    /// [`ErrorPolicy::Skip`], which are logged and counted. On failure or
    /// cancellation the remaining tasks are detached, not aborted.
    pub async fn run<F, Fut>(self, job: F) -> Result<StageReport, PipelineError>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, PipelineError>> + Send + 'static,
    {
        let WorkerPool {
            stage,
            mut input,
            output,
            gate,
            policy,
            cancel,
        } = self;
        let job = Arc::new(job);
        let mut supervisor = Supervisor {
            stage,
            policy,
            cancel,
            workers: JoinSet::new(),
            report: StageReport::new(stage),
        };

        let result: Result<(), PipelineError> = async {
            loop {
                let Some(Some(item)) = supervisor.wait_for(input.recv()).await? else {
                    break;
                };
                let Some(permit) = supervisor.wait_for(gate.clone().acquire_owned()).await?
                else {
                    break;
                };
                let permit = permit.map_err(|_| PipelineError::TaskFailed {
                    stage: stage.to_string(),
                    message: "admission gate closed".to_string(),
                })?;
                if supervisor.cancel.is_cancelled() {
                    break;
                }

                let job = Arc::clone(&job);
                let output = output.clone();
                supervisor.workers.spawn(async move {
                    // Released on every exit path, including unwinding.
                    let _permit = permit;
                    let result = job(item).await?;
                    if output.send(result).await.is_err() {
                        tracing::debug!("{stage}: downstream closed, result dropped");
                    }
                    Ok::<(), PipelineError>(())
                });
            }
            supervisor.drain().await
        }
        .await;

        supervisor.workers.detach_all();
        result.map(|()| supervisor.report)
    }
}

/// Dispatcher-side bookkeeping for spawned tasks.
struct Supervisor {
    stage: Stage,
    policy: ErrorPolicy,
    cancel: CancellationToken,
    workers: JoinSet<Result<(), PipelineError>>,
    report: StageReport,
}

impl Supervisor {
    /// Await `fut` while settling tasks that finish in the meantime.
    ///
    /// Returns `Ok(None)` if the run is cancelled first.
    async fn wait_for<T>(
        &mut self,
        fut: impl Future<Output = T>,
    ) -> Result<Option<T>, PipelineError> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    self.settle(joined)?;
                }
                value = &mut fut => return Ok(Some(value)),
            }
        }
    }

    /// Wait for every remaining task, unless cancelled.
    async fn drain(&mut self) -> Result<(), PipelineError> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                joined = self.workers.join_next() => match joined {
                    Some(joined) => self.settle(joined)?,
                    None => return Ok(()),
                },
            }
        }
    }

    fn settle(
        &mut self,
        joined: Result<Result<(), PipelineError>, JoinError>,
    ) -> Result<(), PipelineError> {
        match joined {
            Ok(Ok(())) => {
                self.report.processed += 1;
                Ok(())
            }
            Ok(Err(e)) if self.policy == ErrorPolicy::Skip && e.is_per_url() => {
                tracing::warn!("Skipped: {e}");
                self.report.failed += 1;
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(PipelineError::TaskFailed {
                stage: self.stage.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn pool(
        concurrency: usize,
        policy: ErrorPolicy,
    ) -> (
        mpsc::Sender<u32>,
        WorkerPool<u32, u32>,
        mpsc::Receiver<u32>,
    ) {
        let (input_tx, input_rx) = bounded_channel(64);
        let (output_tx, output_rx) = bounded_channel(64);
        let pool = WorkerPool::new(
            Stage::Analyze,
            input_rx,
            output_tx,
            concurrency,
            policy,
            CancellationToken::new(),
        );
        (input_tx, pool, output_rx)
    }

    fn bad_item(n: u32) -> PipelineError {
        PipelineError::Decode {
            url: format!("item-{n}"),
            message: "bad".to_string(),
        }
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::FetchAnalyze.to_string(), "fetch+analyze");
        assert_eq!(Stage::Sink.to_string(), "sink");
    }

    #[tokio::test]
    async fn test_bounded_channel() {
        let (tx, mut rx) = bounded_channel::<i32>(10);
        tx.send(42).await.unwrap();
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pool_processes_every_item() {
        let (input_tx, pool, mut output_rx) = pool(3, ErrorPolicy::FailFast);
        let handle = tokio::spawn(pool.run(|x| async move { Ok(x * 2) }));

        for i in 1..=10 {
            input_tx.send(i).await.unwrap();
        }
        drop(input_tx);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.processed, 10);
        assert_eq!(report.failed, 0);

        let mut results = Vec::new();
        while let Some(x) = output_rx.recv().await {
            results.push(x);
        }
        results.sort_unstable();
        assert_eq!(results, (1..=10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pool_never_exceeds_gate() {
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));
        let (input_tx, pool, mut output_rx) = pool(2, ErrorPolicy::FailFast);

        let (flight, max) = (in_flight.clone(), max_seen.clone());
        let handle = tokio::spawn(pool.run(move |x| {
            let (flight, max) = (flight.clone(), max.clone());
            async move {
                let current = flight.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                flight.fetch_sub(1, Ordering::SeqCst);
                Ok(x)
            }
        }));

        for i in 0..12 {
            input_tx.send(i).await.unwrap();
        }
        drop(input_tx);
        let report = handle.await.unwrap().unwrap();
        while output_rx.recv().await.is_some() {}

        assert_eq!(report.processed, 12);
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert!(max_seen.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fail_fast_returns_first_error() {
        let (input_tx, pool, _output_rx) = pool(1, ErrorPolicy::FailFast);
        let handle = tokio::spawn(pool.run(|x| async move {
            if x == 3 {
                Err(bad_item(x))
            } else {
                Ok(x)
            }
        }));

        for i in 0..6 {
            if input_tx.send(i).await.is_err() {
                break;
            }
        }
        drop(input_tx);

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("item-3"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_skip_policy_counts_failures() {
        let (input_tx, pool, mut output_rx) = pool(4, ErrorPolicy::Skip);
        let handle = tokio::spawn(pool.run(|x| async move {
            if x % 3 == 0 {
                Err(bad_item(x))
            } else {
                Ok(x)
            }
        }));

        for i in 0..9 {
            input_tx.send(i).await.unwrap();
        }
        drop(input_tx);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.failed, 3);
        assert_eq!(report.processed, 6);

        let mut count = 0;
        while output_rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_skip_policy_still_fails_on_write_errors() {
        let (input_tx, pool, _output_rx) = pool(2, ErrorPolicy::Skip);
        let handle = tokio::spawn(pool.run(|_x| async move {
            Err::<u32, _>(PipelineError::Write {
                path: "out.csv".into(),
                message: "disk full".to_string(),
            })
        }));
        input_tx.send(1).await.unwrap();
        drop(input_tx);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_task_releases_slot_and_fails_stage() {
        let (input_tx, pool, _output_rx) = pool(1, ErrorPolicy::Skip);
        let handle = tokio::spawn(pool.run(|x: u32| async move {
            if x == 0 {
                panic!("boom");
            }
            Ok(x)
        }));
        input_tx.send(0).await.unwrap();
        drop(input_tx);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::TaskFailed { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_pool_stops_admitting() {
        let calls = Arc::new(AtomicU32::new(0));
        let (input_tx, input_rx) = bounded_channel(8);
        let (output_tx, _output_rx) = bounded_channel::<u32>(8);
        let cancel = CancellationToken::new();
        let pool = WorkerPool::new(
            Stage::Fetch,
            input_rx,
            output_tx,
            2,
            ErrorPolicy::FailFast,
            cancel.clone(),
        );

        cancel.cancel();
        input_tx.send(1u32).await.unwrap();
        let counter = calls.clone();
        let report = pool
            .run(move |x| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(x) }
            })
            .await
            .unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
