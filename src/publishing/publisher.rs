//! Publishes due songs and fans out their release side effects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::music::{DueSong, NewCommunityPost, ReleaseStore, Song};
use crate::notifications::{NewNotification, NewReleaseData, NotificationStore, NotificationType};
use crate::server::metrics;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to fetch scheduled songs: {0}")]
    Selection(#[source] anyhow::Error),
}

/// Outcome of one publishing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Songs selected as due when the run started.
    pub due: usize,
    /// Songs flipped to published by this run, in processing order.
    pub published: Vec<String>,
    /// Due songs this run did not publish, either because the update failed or
    /// because another run claimed them first.
    pub skipped: Vec<String>,
    /// Community posts, follower lookups and notification batches that failed.
    pub side_effect_failures: usize,
}

impl PublishReport {
    pub fn count(&self) -> usize {
        self.published.len()
    }

    /// True when selection found nothing to publish.
    pub fn nothing_due(&self) -> bool {
        self.due == 0
    }
}

enum SongOutcome {
    Published { side_effect_failures: usize },
    Skipped,
}

/// Text of the community post announcing a release.
pub fn release_post_content(song: &Song) -> String {
    match song.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => description.to_string(),
        _ => format!("New release: {}", song.title),
    }
}

/// One `new_release` notification per follower.
pub fn build_release_notifications(
    due: &DueSong,
    follower_ids: Vec<String>,
) -> Vec<NewNotification> {
    let stage_name = &due.artist.stage_name;
    let metadata = serde_json::to_value(NewReleaseData {
        song_id: due.song.id.clone(),
        artist_id: due.artist.id.clone(),
        artist_name: stage_name.clone(),
    })
    .unwrap_or_default();

    follower_ids
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            notification_type: NotificationType::NewRelease,
            title: format!("New release from {}", stage_name),
            message: format!("{} just released \"{}\"", stage_name, due.song.title),
            link: Some(format!("/songs/{}", due.song.id)),
            metadata: metadata.clone(),
        })
        .collect()
}

pub struct ReleasePublisher {
    release_store: Arc<dyn ReleaseStore>,
    notification_store: Arc<dyn NotificationStore>,
}

impl ReleasePublisher {
    pub fn new(
        release_store: Arc<dyn ReleaseStore>,
        notification_store: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            release_store,
            notification_store,
        }
    }

    /// Publishes every song due at `now`.
    pub fn publish_due_songs(&self, now: DateTime<Utc>) -> Result<PublishReport, PublishError> {
        self.run(now, None)
    }

    /// Like [`publish_due_songs`](Self::publish_due_songs), but stops before
    /// the next song once `cancel` fires. Songs left over stay due.
    pub fn publish_due_songs_until(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PublishReport, PublishError> {
        self.run(now, Some(cancel))
    }

    fn run(
        &self,
        now: DateTime<Utc>,
        cancel: Option<&CancellationToken>,
    ) -> Result<PublishReport, PublishError> {
        let due_songs = match self.release_store.get_due_songs(now) {
            Ok(songs) => songs,
            Err(e) => {
                error!("Failed to fetch scheduled songs: {}", e);
                metrics::record_publish_run("error");
                return Err(PublishError::Selection(e));
            }
        };

        let mut report = PublishReport {
            due: due_songs.len(),
            ..Default::default()
        };
        if due_songs.is_empty() {
            debug!("No songs due for publishing");
            metrics::record_publish_run("empty");
            return Ok(report);
        }

        info!("Publishing {} due song(s)", due_songs.len());

        for due in &due_songs {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                warn!(
                    "Publishing cancelled, {} song(s) left for the next run",
                    due_songs.len() - report.published.len() - report.skipped.len()
                );
                break;
            }

            match self.publish_one(due, now) {
                SongOutcome::Published {
                    side_effect_failures,
                } => {
                    report.side_effect_failures += side_effect_failures;
                    report.published.push(due.song.id.clone());
                }
                SongOutcome::Skipped => report.skipped.push(due.song.id.clone()),
            }
        }

        info!(
            "Published {} song(s), skipped {}, {} side effect failure(s)",
            report.published.len(),
            report.skipped.len(),
            report.side_effect_failures
        );
        metrics::record_publish_run("ok");
        Ok(report)
    }

    fn publish_one(&self, due: &DueSong, now: DateTime<Utc>) -> SongOutcome {
        let song = &due.song;

        match self.release_store.publish_song(&song.id, now) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Song {} was already claimed by another run", song.id);
                return SongOutcome::Skipped;
            }
            Err(e) => {
                error!("Failed to publish song {}: {}", song.id, e);
                return SongOutcome::Skipped;
            }
        }
        metrics::record_song_published();

        let mut failures = 0;

        let post = NewCommunityPost {
            artist_id: due.artist.id.clone(),
            song_id: Some(song.id.clone()),
            content: release_post_content(song),
            image_url: song.cover_image_url.clone(),
        };
        if let Err(e) = self.release_store.create_community_post(post) {
            warn!("Failed to create release post for song {}: {}", song.id, e);
            metrics::record_publish_side_effect_failure("community_post");
            failures += 1;
        }

        match self.release_store.get_follower_ids(&due.artist.id) {
            Ok(follower_ids) if follower_ids.is_empty() => {
                debug!("Artist {} has no followers to notify", due.artist.id);
            }
            Ok(follower_ids) => {
                let notifications = build_release_notifications(due, follower_ids);
                let count = notifications.len();
                match self.notification_store.insert_notifications(notifications) {
                    Ok(_) => debug!("Notified {} follower(s) about song {}", count, song.id),
                    Err(e) => {
                        warn!(
                            "Failed to notify {} follower(s) about song {}: {}",
                            count, song.id, e
                        );
                        metrics::record_publish_side_effect_failure("notifications");
                        failures += 1;
                    }
                }
            }
            Err(e) => {
                warn!("Failed to fetch followers of artist {}: {}", due.artist.id, e);
                metrics::record_publish_side_effect_failure("followers");
                failures += 1;
            }
        }

        info!("Published song {} ({})", song.id, song.title);
        SongOutcome::Published {
            side_effect_failures: failures,
        }
    }
}
