use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::analytics::{AnalyticsStore, SongAnalytics, TrafficSource};

/// Issues the single increment a [`PlayTracker`](super::PlayTracker) fires
/// once a song has been listened to long enough.
#[async_trait]
pub trait PlayCounter: Send + Sync + 'static {
    async fn increment(
        &self,
        song_id: &str,
        traffic_source: Option<&TrafficSource>,
    ) -> Result<SongAnalytics>;
}

/// Increments directly against the analytics store.
pub struct StorePlayCounter {
    store: Arc<dyn AnalyticsStore>,
}

impl StorePlayCounter {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PlayCounter for StorePlayCounter {
    async fn increment(
        &self,
        song_id: &str,
        traffic_source: Option<&TrafficSource>,
    ) -> Result<SongAnalytics> {
        let store = self.store.clone();
        let song_id = song_id.to_string();
        let traffic_source = traffic_source.cloned();

        let analytics = tokio::task::spawn_blocking(move || {
            store.increment_play_count(&song_id, traffic_source.as_ref())
        })
        .await
        .context("Increment task panicked")??;
        Ok(analytics)
    }
}
