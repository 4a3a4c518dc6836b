//! Play counter that calls the increment endpoint over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PlayCounter;
use crate::analytics::{SongAnalytics, TrafficSource};

pub const INCREMENT_PLAY_COUNT_PATH: &str = "/functions/v1/increment-play-count";

#[derive(Serialize)]
struct IncrementRequest<'a> {
    song_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    traffic_source: Option<&'a str>,
}

#[derive(Deserialize)]
struct IncrementResponse {
    analytics: SongAnalytics,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct HttpPlayCounter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPlayCounter {
    /// # Arguments
    /// * `base_url` - Server base URL (e.g., "http://localhost:3001")
    /// * `api_key` - Sent as bearer token and `apikey` header when present
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: &str, api_key: Option<String>, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        let endpoint = format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            INCREMENT_PLAY_COUNT_PATH
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl PlayCounter for HttpPlayCounter {
    async fn increment(
        &self,
        song_id: &str,
        traffic_source: Option<&TrafficSource>,
    ) -> Result<SongAnalytics> {
        let mut request = self.client.post(&self.endpoint).json(&IncrementRequest {
            song_id,
            traffic_source: traffic_source.map(TrafficSource::as_str),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach increment endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "no error message".to_string());
            anyhow::bail!("Increment for {} failed with {}: {}", song_id, status, message);
        }

        let body: IncrementResponse = response
            .json()
            .await
            .context("Failed to parse increment response")?;
        Ok(body.analytics)
    }
}
