use super::context::JobContext;
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use crate::server::metrics;
use crate::server_store::{JobRunStatus, ServerStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const RUNNING_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
///
/// At most one instance of a job runs at a time. Interval jobs are due again
/// one interval after their previous run started.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,

    /// When each interval job is next due. Missing means due now.
    next_runs: HashMap<String, Instant>,

    running_handles: HashMap<String, JoinHandle<()>>,

    job_cancel_tokens: HashMap<String, CancellationToken>,

    server_store: Arc<dyn ServerStore>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(server_store: Arc<dyn ServerStore>, shutdown_token: CancellationToken) -> Self {
        // Jobs get their own token tree so that shutdown only cancels the
        // cancellable ones.
        let job_context = JobContext::new(CancellationToken::new(), Arc::clone(&server_store));
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            server_store,
            shutdown_token,
            job_context,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        self.jobs.insert(job_id, job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn is_running(&self, job_id: &str) -> bool {
        self.running_handles
            .get(job_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled and
    /// running jobs have been dealt with.
    pub async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.job_count()
        );

        match self.server_store.mark_stale_jobs_failed() {
            Ok(count) if count > 0 => {
                info!("Marked {} stale jobs as failed from previous run", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale jobs: {}", e);
            }
        }

        self.trigger_jobs_for_hook(HookEvent::OnStartup);

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let mut min_duration = DEFAULT_CHECK_INTERVAL;
        if !self.running_handles.is_empty() {
            min_duration = RUNNING_POLL_INTERVAL;
        }

        let now = Instant::now();
        for (job_id, job) in &self.jobs {
            if job.schedule().interval().is_none() || self.is_running(job_id) {
                continue;
            }
            match self.next_runs.get(job_id) {
                Some(next_run) if *next_run > now => {
                    min_duration = min_duration.min(*next_run - now);
                }
                _ => return Duration::ZERO,
            }
        }

        min_duration
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .jobs
            .iter()
            .filter(|(job_id, job)| {
                job.schedule().interval().is_some()
                    && !self.is_running(job_id)
                    && self
                        .next_runs
                        .get(*job_id)
                        .map_or(true, |next_run| *next_run <= now)
            })
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in due {
            self.spawn_job(&job_id, "schedule");
        }
    }

    fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let to_trigger: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.schedule().listens_to(event))
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in to_trigger {
            if self.is_running(&job_id) {
                debug!("Skipping hook trigger for already running job: {}", job_id);
                continue;
            }
            self.spawn_job(&job_id, &format!("hook:{}", event));
        }
    }

    fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = match self.jobs.get(job_id) {
            Some(job) => Arc::clone(job),
            None => {
                error!("Attempted to spawn unknown job: {}", job_id);
                return;
            }
        };

        // Scheduled before recording so a failing store does not make the
        // job due again immediately.
        if let Some(interval) = job.schedule().interval() {
            self.next_runs
                .insert(job_id.to_string(), Instant::now() + interval);
        }

        let run_id = match self.server_store.record_job_start(job_id, triggered_by) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Starting job: {} (run_id: {}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        metrics::set_background_job_running(job_id, true);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = JobContext::new(cancel_token, Arc::clone(&self.server_store));

        let server_store = Arc::clone(&self.server_store);
        let job_id_owned = job_id.to_string();

        let handle = tokio::spawn(async move {
            let start_time = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (status, error_msg, status_label) = match result {
                Ok(Ok(())) => {
                    info!(
                        "Job {} completed successfully in {:?}",
                        job_id_owned, elapsed
                    );
                    (JobRunStatus::Completed, None, "success")
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (
                        JobRunStatus::Failed,
                        Some("Cancelled".to_string()),
                        "cancelled",
                    )
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()), "failed")
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (
                        JobRunStatus::Failed,
                        Some(format!("Task panic: {}", e)),
                        "panic",
                    )
                }
            };

            metrics::record_background_job_execution(&job_id_owned, status_label, elapsed);
            metrics::set_background_job_running(&job_id_owned, false);

            if let Err(e) = server_store.record_job_finish(run_id, status, error_msg) {
                error!("Failed to record job finish for {}: {}", job_id_owned, e);
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            let behavior = self
                .jobs
                .get(job_id)
                .map(|job| job.shutdown_behavior())
                .unwrap_or_default();
            if behavior == ShutdownBehavior::Cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            if !handle.is_finished() {
                info!("Waiting for job {} to finish...", job_id);
            }
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await;
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::JobSchedule;
    use crate::server_store::{JobRun, SqliteServerStore};
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        schedule: JobSchedule,
    }

    impl BackgroundJob for CountingJob {
        fn id(&self) -> &'static str {
            "counting"
        }
        fn name(&self) -> &'static str {
            "Counting"
        }
        fn description(&self) -> &'static str {
            "Counts its runs"
        }
        fn schedule(&self) -> JobSchedule {
            self.schedule.clone()
        }
        fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowJob;

    impl BackgroundJob for SlowJob {
        fn id(&self) -> &'static str {
            "slow"
        }
        fn name(&self) -> &'static str {
            "Slow"
        }
        fn description(&self) -> &'static str {
            "Runs until cancelled"
        }
        fn schedule(&self) -> JobSchedule {
            JobSchedule::Hook(HookEvent::OnStartup)
        }
        fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
            for _ in 0..500 {
                if ctx.is_cancelled() {
                    return Err(JobError::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        }
    }

    /// Server store whose writes always fail.
    #[derive(Default)]
    struct BrokenServerStore {
        start_attempts: AtomicUsize,
    }

    impl ServerStore for BrokenServerStore {
        fn record_job_start(&self, _job_id: &str, _triggered_by: &str) -> Result<i64> {
            self.start_attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("disk full"))
        }
        fn record_job_finish(
            &self,
            _run_id: i64,
            _status: JobRunStatus,
            _error_message: Option<String>,
        ) -> Result<()> {
            Err(anyhow!("disk full"))
        }
        fn get_job_history(&self, _job_id: &str, _limit: usize) -> Result<Vec<JobRun>> {
            Ok(Vec::new())
        }
        fn get_last_run(&self, _job_id: &str) -> Result<Option<JobRun>> {
            Ok(None)
        }
        fn mark_stale_jobs_failed(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn server_store() -> (Arc<SqliteServerStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap();
        (Arc::new(store), temp_dir)
    }

    #[tokio::test]
    async fn runs_interval_job_repeatedly_and_records_history() {
        let (store, _tmp) = server_store();
        let runs = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let mut scheduler = JobScheduler::new(store.clone(), shutdown.clone());
        scheduler.register_job(Arc::new(CountingJob {
            runs: runs.clone(),
            schedule: JobSchedule::Combined {
                interval: Some(Duration::from_millis(100)),
                hooks: vec![HookEvent::OnStartup],
            },
        }));
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(1200)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        let total = runs.load(Ordering::SeqCst);
        assert!(total >= 2, "expected repeated runs, got {}", total);

        let history = store.get_job_history("counting", 100).unwrap();
        assert_eq!(history.len(), total);
        assert!(history
            .iter()
            .all(|run| run.status == JobRunStatus::Completed));
        assert!(history
            .iter()
            .any(|run| run.triggered_by == "hook:OnStartup"));
    }

    #[tokio::test]
    async fn shutdown_cancels_cancellable_jobs() {
        let (store, _tmp) = server_store();
        let shutdown = CancellationToken::new();

        let mut scheduler = JobScheduler::new(store.clone(), shutdown.clone());
        scheduler.register_job(Arc::new(SlowJob));
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        let last = store.get_last_run("slow").unwrap().unwrap();
        assert_eq!(last.status, JobRunStatus::Failed);
        assert_eq!(last.error_message.as_deref(), Some("Cancelled"));
    }

    #[tokio::test]
    async fn failing_job_start_waits_for_next_interval() {
        let store = Arc::new(BrokenServerStore::default());
        let runs = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let mut scheduler = JobScheduler::new(store.clone(), shutdown.clone());
        scheduler.register_job(Arc::new(CountingJob {
            runs: runs.clone(),
            schedule: JobSchedule::Interval(Duration::from_secs(60)),
        }));
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.start_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn startup_marks_stale_runs_failed() {
        let (store, _tmp) = server_store();
        store.record_job_start("leftover", "schedule").unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut scheduler = JobScheduler::new(store.clone(), shutdown);
        scheduler.run().await;

        let last = store.get_last_run("leftover").unwrap().unwrap();
        assert_eq!(last.status, JobRunStatus::Failed);
    }
}
