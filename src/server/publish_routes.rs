//! Trigger endpoint of the scheduled publishing workflow.

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use super::metrics;
use super::state::{GuardedAuthenticator, GuardedPublisher};

#[derive(Serialize)]
struct PublishResponse {
    message: String,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<Vec<String>>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub async fn publish_scheduled_songs(
    method: Method,
    State(authenticator): State<GuardedAuthenticator>,
    State(publisher): State<GuardedPublisher>,
    headers: HeaderMap,
) -> Response {
    // Bare preflight without CORS request headers
    if method == Method::OPTIONS {
        return (StatusCode::OK, "ok").into_response();
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let credential = match authenticator.authorize(authorization) {
        Ok(credential) => credential,
        Err(e) => {
            warn!("Rejected publishing trigger: {}", e);
            metrics::record_publish_run("unauthorized");
            return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    };
    metrics::record_publish_trigger(credential.as_str());

    let result =
        tokio::task::spawn_blocking(move || publisher.publish_due_songs(Utc::now())).await;

    match result {
        Ok(Ok(report)) if report.nothing_due() => Json(PublishResponse {
            message: "No songs to publish".to_string(),
            count: 0,
            published: None,
        })
        .into_response(),
        Ok(Ok(report)) => Json(PublishResponse {
            message: format!("Published {} song(s)", report.count()),
            count: report.count(),
            published: Some(report.published),
        })
        .into_response(),
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        Err(e) => {
            error!("Publishing task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Publishing task failed")
        }
    }
}
