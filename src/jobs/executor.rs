use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::chat::Recorder;
use crate::error::AppResult;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::types::{ExecutionMode, Job, RunContext};

/// Tracks which jobs are running; at most one run per key.
#[derive(Clone, Default)]
pub struct ConcurrencyTracker {
    running: Arc<Mutex<HashSet<String>>>,
}

impl ConcurrencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as running until the returned guard is dropped.
    pub fn try_acquire(&self, key: &str) -> JobResult<RunGuard> {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !running.insert(key.to_string()) {
            return Err(JobError::AlreadyRunning(key.to_string()));
        }
        Ok(RunGuard {
            tracker: self.clone(),
            key: key.to_string(),
        })
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.running
            .lock()
            .map(|running| running.contains(key))
            .unwrap_or(false)
    }
}

pub struct RunGuard {
    tracker: ConcurrencyTracker,
    key: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut running = self
            .tracker
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.remove(&self.key);
    }
}

/// Outcome of one run
pub struct RunReport {
    pub run_id: Uuid,
    pub elapsed: Duration,
    pub result: AppResult<()>,
}

/// Runs jobs with overlap suppression and records failures.
pub struct JobExecutor {
    concurrency: ConcurrencyTracker,
    recorder: Recorder,
    cancel: CancellationToken,
}

impl JobExecutor {
    pub fn new(recorder: Recorder, cancel: CancellationToken) -> Self {
        Self {
            concurrency: ConcurrencyTracker::new(),
            recorder,
            cancel,
        }
    }

    pub fn concurrency(&self) -> &ConcurrencyTracker {
        &self.concurrency
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Runs `job` unless another run of it is in flight. A failing run is
    /// posted to the recorder and returned in the report, never raised.
    pub async fn execute(&self, job: &dyn Job, mode: ExecutionMode) -> JobResult<RunReport> {
        let _guard = self.concurrency.try_acquire(&job.instance())?;

        let ctx = RunContext::new(job.name(), mode, self.cancel.clone(), self.recorder.clone());
        let span = tracing::info_span!(
            "job",
            job = %job.name(),
            run_id = %ctx.run_id,
            mode = %mode,
        );

        async {
            tracing::info!("Job started");
            let start = Instant::now();
            let result = job.sync(&ctx).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "Job finished"),
                Err(e) => {
                    tracing::error!(elapsed_ms = elapsed.as_millis() as u64, error = %e, "Job failed");
                    self.recorder
                        .warning("ReportError", &format!("Job reported error: {}", e))
                        .await;
                }
            }

            Ok(RunReport {
                run_id: ctx.run_id,
                elapsed,
                result,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingTransport, StubJob, recorder};

    #[test]
    fn test_guard_releases_on_drop() {
        let tracker = ConcurrencyTracker::new();
        let guard = tracker.try_acquire("stale").unwrap();
        assert!(tracker.is_running("stale"));
        assert!(matches!(
            tracker.try_acquire("stale"),
            Err(JobError::AlreadyRunning(_))
        ));
        assert!(tracker.try_acquire("close-stale").is_ok());

        drop(guard);
        assert!(!tracker.is_running("stale"));
        assert!(tracker.try_acquire("stale").is_ok());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_raised() {
        let transport = Arc::new(RecordingTransport::default());
        let executor = JobExecutor::new(recorder(&transport), CancellationToken::new());
        let job = StubJob::manual("broken").failing();

        let report = executor.execute(&job, ExecutionMode::Production).await.unwrap();
        assert!(report.result.is_err());
        assert_eq!(job.runs(), 1);

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.contains("Job reported error"));
    }

    #[tokio::test]
    async fn test_overlapping_run_rejected() {
        let transport = Arc::new(RecordingTransport::default());
        let executor = Arc::new(JobExecutor::new(recorder(&transport), CancellationToken::new()));
        let job = Arc::new(StubJob::manual("slow").with_delay(Duration::from_millis(100)));

        let first = {
            let (executor, job) = (Arc::clone(&executor), Arc::clone(&job));
            tokio::spawn(async move { executor.execute(job.as_ref(), ExecutionMode::Production).await.is_ok() })
        };
        job.wait_started().await;

        let second = executor.execute(job.as_ref(), ExecutionMode::Debug).await;
        assert!(matches!(second, Err(JobError::AlreadyRunning(_))));
        assert!(first.await.unwrap());
        assert_eq!(job.runs(), 1);
    }
}
