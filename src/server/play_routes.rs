//! Play count and analytics endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::metrics;
use super::state::GuardedAnalyticsStore;
use crate::analytics::{IncrementError, SongAnalytics, TrafficSource};

#[derive(Deserialize, Debug)]
pub struct IncrementPlayCountBody {
    pub song_id: Option<String>,
    pub traffic_source: Option<String>,
}

#[derive(Serialize)]
struct TrafficSourceCount {
    source: String,
    plays: u64,
}

#[derive(Serialize)]
struct SongAnalyticsResponse {
    #[serde(flatten)]
    analytics: SongAnalytics,
    traffic_sources: Vec<TrafficSourceCount>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub async fn increment_play_count(
    State(analytics_store): State<GuardedAnalyticsStore>,
    body: Result<Json<IncrementPlayCountBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!("Invalid increment body: {}", rejection);
            metrics::record_play_increment("invalid");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    let song_id = match body.song_id.map(|id| id.trim().to_string()) {
        Some(id) if !id.is_empty() => id,
        _ => {
            metrics::record_play_increment("invalid");
            return error_response(StatusCode::BAD_REQUEST, "song_id is required");
        }
    };
    let traffic_source = TrafficSource::from_client(body.traffic_source.as_deref());

    let result = tokio::task::spawn_blocking(move || {
        analytics_store.increment_play_count(&song_id, traffic_source.as_ref())
    })
    .await;

    match result {
        Ok(Ok(analytics)) => {
            metrics::record_play_increment("ok");
            Json(json!({ "success": true, "analytics": analytics })).into_response()
        }
        Ok(Err(IncrementError::NotFound(song_id))) => {
            error!("No analytics row for song {}", song_id);
            metrics::record_play_increment("not_found");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch song analytics",
            )
        }
        Ok(Err(IncrementError::Store(e))) => {
            error!("Failed to increment play count: {}", e);
            metrics::record_play_increment("error");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update play count",
            )
        }
        Err(e) => {
            error!("Increment task failed: {}", e);
            metrics::record_play_increment("error");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update play count",
            )
        }
    }
}

pub async fn get_song_analytics(
    State(analytics_store): State<GuardedAnalyticsStore>,
    Path(song_id): Path<String>,
) -> Response {
    let analytics = match analytics_store.get_song_analytics(&song_id) {
        Ok(Some(analytics)) => analytics,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!("Failed to read analytics of {}: {}", song_id, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch song analytics",
            );
        }
    };

    let traffic_sources = match analytics_store.get_traffic_breakdown(&song_id) {
        Ok(breakdown) => breakdown
            .into_iter()
            .map(|(source, plays)| TrafficSourceCount { source, plays })
            .collect(),
        Err(e) => {
            error!("Failed to read traffic sources of {}: {}", song_id, e);
            Vec::new()
        }
    };

    Json(SongAnalyticsResponse {
        analytics,
        traffic_sources,
    })
    .into_response()
}
