//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint. When API routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::{Method, Response};
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET / (uptime, build hash and play threshold)
    pub async fn status(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Status request failed")
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// POST /functions/v1/publish-scheduled-songs, with a bearer token when
    /// given.
    pub async fn publish_scheduled(&self, token: Option<&str>) -> Response {
        let mut request = self
            .client
            .post(format!("{}/functions/v1/publish-scheduled-songs", self.base_url));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Publish request failed")
    }

    pub async fn publish_scheduled_with_header(&self, authorization: &str) -> Response {
        self.client
            .post(format!("{}/v1/releases/publish-scheduled", self.base_url))
            .header("Authorization", authorization)
            .send()
            .await
            .expect("Publish request failed")
    }

    pub async fn preflight(&self, path: &str) -> Response {
        self.client
            .request(Method::OPTIONS, format!("{}{}", self.base_url, path))
            .header("Origin", "https://app.greenbox.test")
            .header("Access-Control-Request-Method", "POST")
            .header(
                "Access-Control-Request-Headers",
                "authorization, content-type",
            )
            .send()
            .await
            .expect("Preflight request failed")
    }

    // ========================================================================
    // Play Counting
    // ========================================================================

    pub async fn increment_play_count(&self, song_id: &str, traffic_source: Option<&str>) -> Response {
        let mut body = json!({ "song_id": song_id });
        if let Some(source) = traffic_source {
            body["traffic_source"] = json!(source);
        }
        self.increment_play_count_raw(body).await
    }

    pub async fn increment_play_count_raw(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/functions/v1/increment-play-count", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Increment request failed")
    }

    pub async fn get_song_analytics(&self, song_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/songs/{}/analytics", self.base_url, song_id))
            .send()
            .await
            .expect("Analytics request failed")
    }
}
