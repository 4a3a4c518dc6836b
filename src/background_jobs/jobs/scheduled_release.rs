//! Scheduled release background job.
//!
//! Publishes due songs on a fixed interval, so releases go out even when no
//! external cron calls the trigger endpoint.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
};
use crate::publishing::ReleasePublisher;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(60);

pub struct ScheduledReleaseJob {
    publisher: Arc<ReleasePublisher>,
    interval: Duration,
}

impl ScheduledReleaseJob {
    pub fn new(publisher: Arc<ReleasePublisher>, interval: Duration) -> Self {
        Self {
            publisher,
            interval,
        }
    }
}

impl BackgroundJob for ScheduledReleaseJob {
    fn id(&self) -> &'static str {
        "scheduled_release"
    }

    fn name(&self) -> &'static str {
        "Scheduled Release"
    }

    fn description(&self) -> &'static str {
        "Publish scheduled songs whose release time has passed"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: Some(self.interval),
            hooks: vec![HookEvent::OnStartup],
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // Unprocessed songs stay due for the next run
        ShutdownBehavior::Cancellable
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let report = self
            .publisher
            .publish_due_songs_until(Utc::now(), &ctx.cancellation_token)
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        if report.count() > 0 {
            info!(
                "Scheduled release published {} song(s): {:?}",
                report.count(),
                report.published
            );
        }

        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greenbox_store::SqliteGreenboxStore;
    use crate::music::{NewSong, ReleaseStore};
    use crate::server_store::SqliteServerStore;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn setup() -> (Arc<SqliteGreenboxStore>, ScheduledReleaseJob, JobContext, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteGreenboxStore::new(temp_dir.path().join("g.db")).unwrap());
        let server_store =
            Arc::new(SqliteServerStore::new(temp_dir.path().join("server.db")).unwrap());
        let publisher = Arc::new(ReleasePublisher::new(store.clone(), store.clone()));
        let job = ScheduledReleaseJob::new(publisher, DEFAULT_PUBLISH_INTERVAL);
        let ctx = JobContext::new(CancellationToken::new(), server_store);
        (store, job, ctx, temp_dir)
    }

    #[test]
    fn publishes_due_songs() {
        let (store, job, ctx, _tmp) = setup();
        store.create_artist(Some("A1"), "Nova", "u").unwrap();
        store
            .create_song(NewSong {
                id: Some("S1".to_string()),
                title: "Dawn".to_string(),
                artist_id: "A1".to_string(),
                scheduled_release_at: Some(Utc::now() - ChronoDuration::minutes(5)),
                ..Default::default()
            })
            .unwrap();

        job.execute(&ctx).unwrap();
        assert!(store.get_song("S1").unwrap().unwrap().is_published);
        assert_eq!(store.get_artist_posts("A1").unwrap().len(), 1);
    }

    #[test]
    fn cancelled_job_does_nothing() {
        let (_store, job, ctx, _tmp) = setup();
        ctx.cancellation_token.cancel();
        assert!(matches!(job.execute(&ctx), Err(JobError::Cancelled)));
    }

    #[test]
    fn schedule_runs_on_startup_and_interval() {
        let (_store, job, _ctx, _tmp) = setup();
        let schedule = job.schedule();
        assert_eq!(schedule.interval(), Some(DEFAULT_PUBLISH_INTERVAL));
        assert!(schedule.listens_to(HookEvent::OnStartup));
    }
}
