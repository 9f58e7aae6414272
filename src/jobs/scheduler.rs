use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::jobs::error::JobError;
use crate::jobs::executor::JobExecutor;
use crate::jobs::types::{ExecutionMode, Job};

/// One independent loop per recurring job.
pub struct JobScheduler {
    executor: Arc<JobExecutor>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new(executor: Arc<JobExecutor>, cancel: CancellationToken) -> Self {
        Self {
            executor,
            cancel,
            handles: Vec::new(),
        }
    }

    /// Spawns a loop for each job; manual jobs are skipped.
    pub fn start(&mut self, jobs: Vec<Arc<dyn Job>>) {
        for job in jobs {
            if job.trigger().next_delay().is_none() {
                tracing::debug!(job = %job.name(), "Job has no trigger, not scheduling");
                continue;
            }

            tracing::info!(
                job = %job.name(),
                instance = %job.instance(),
                trigger = %job.trigger().describe(),
                "Scheduling job"
            );
            self.handles.push(tokio::spawn(run_loop(
                job,
                Arc::clone(&self.executor),
                self.cancel.clone(),
            )));
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every loop to finish its current run and exit.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        for result in futures::future::join_all(self.handles.drain(..)).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job loop ended abnormally");
            }
        }
    }
}

async fn run_loop(job: Arc<dyn Job>, executor: Arc<JobExecutor>, cancel: CancellationToken) {
    // The next firing is computed after each run, so an overrunning job
    // skips the firings it missed instead of queueing them.
    while let Some(delay) = job.trigger().next_delay() {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        match executor.execute(job.as_ref(), ExecutionMode::Production).await {
            Ok(_) => {}
            Err(JobError::AlreadyRunning(instance)) => {
                tracing::info!(job = %job.name(), %instance, "Skipping scheduled run, job is already running");
            }
            Err(e) => tracing::error!(job = %job.name(), error = %e, "Scheduled run failed to start"),
        }
    }
    tracing::debug!(job = %job.name(), "Job loop stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{RecordingTransport, StubJob, recorder};

    fn scheduler(transport: &Arc<RecordingTransport>) -> (JobScheduler, Arc<JobExecutor>, CancellationToken) {
        let cancel = CancellationToken::new();
        let executor = Arc::new(JobExecutor::new(recorder(transport), cancel.clone()));
        (JobScheduler::new(Arc::clone(&executor), cancel.clone()), executor, cancel)
    }

    #[tokio::test]
    async fn test_loop_repeats_until_shutdown() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut scheduler, _, _) = scheduler(&transport);
        let job = Arc::new(StubJob::every("tick", Duration::from_millis(20)));

        scheduler.start(vec![job.clone() as Arc<dyn Job>]);
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;

        let runs = job.runs();
        assert!(runs >= 2, "expected repeated runs, got {runs}");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(job.runs(), runs);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_current_run() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut scheduler, _, _) = scheduler(&transport);
        let job = Arc::new(
            StubJob::every("slow", Duration::from_millis(10)).with_delay(Duration::from_millis(150)),
        );

        scheduler.start(vec![job.clone() as Arc<dyn Job>]);
        job.wait_started().await;
        scheduler.shutdown().await;

        assert_eq!(job.runs(), 1);
        assert_eq!(job.finished(), 1);
    }

    #[tokio::test]
    async fn test_manual_jobs_not_scheduled() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut scheduler, _, _) = scheduler(&transport);

        scheduler.start(vec![Arc::new(StubJob::manual("report")) as Arc<dyn Job>]);
        assert!(scheduler.is_empty());
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_tick_skipped_while_manual_run_in_flight() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut scheduler, executor, _) = scheduler(&transport);
        let job = Arc::new(StubJob::every("busy", Duration::from_millis(10)));

        // Hold the job's slot as a manual trigger would
        let guard = executor.concurrency().try_acquire("busy").unwrap();
        scheduler.start(vec![job.clone() as Arc<dyn Job>]);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(job.runs(), 0);

        drop(guard);
        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.shutdown().await;
        assert!(job.runs() >= 1);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_looping() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut scheduler, _, _) = scheduler(&transport);
        let job = Arc::new(StubJob::every("flaky", Duration::from_millis(20)).failing());

        scheduler.start(vec![job.clone() as Arc<dyn Job>]);
        tokio::time::sleep(Duration::from_millis(120)).await;
        scheduler.shutdown().await;

        assert!(job.runs() >= 2);
        assert!(transport.messages().len() >= 2);
    }
}
