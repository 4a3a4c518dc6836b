use thiserror::Error;

use super::models::{SongAnalytics, TrafficSource};

#[derive(Debug, Error)]
pub enum IncrementError {
    #[error("No analytics row for song {0}")]
    NotFound(String),

    #[error("Failed to update play counters: {0}")]
    Store(#[from] anyhow::Error),
}

/// Storage for per-song play analytics.
pub trait AnalyticsStore: Send + Sync {
    fn get_song_analytics(&self, song_id: &str) -> anyhow::Result<Option<SongAnalytics>>;

    /// Atomically bumps `total_plays`, `plays_last_7_days` and
    /// `plays_last_30_days` by one, refreshes `updated_at`, and appends a play
    /// event. Nothing is written when the song has no analytics row.
    fn increment_play_count(
        &self,
        song_id: &str,
        traffic_source: Option<&TrafficSource>,
    ) -> Result<SongAnalytics, IncrementError>;

    /// Number of recorded plays per traffic source for a song. Plays without a
    /// source are reported under "unknown".
    fn get_traffic_breakdown(&self, song_id: &str) -> anyhow::Result<Vec<(String, u64)>>;
}
