use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName},
    middleware,
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::metrics::metrics_handler;
use super::play_routes::{get_song_analytics, increment_play_count};
use super::publish_routes::publish_scheduled_songs;
use super::{log_requests, state::ServerState};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub play_threshold_secs: u64,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        play_threshold_secs: state.config.play_threshold.as_secs(),
    };
    Json(stats)
}

fn make_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

pub fn make_app(state: ServerState) -> Router {
    // Paths the hosted functions were reachable at
    let function_routes: Router<ServerState> = Router::new()
        .route("/publish-scheduled-songs", any(publish_scheduled_songs))
        .route("/increment-play-count", post(increment_play_count));

    let v1_routes: Router<ServerState> = Router::new()
        .route("/releases/publish-scheduled", any(publish_scheduled_songs))
        .route("/plays", post(increment_play_count))
        .route("/songs/{id}/analytics", get(get_song_analytics));

    Router::new()
        .route("/", get(home))
        .nest("/functions/v1", function_routes)
        .nest("/v1", v1_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(make_cors_layer())
        .with_state(state)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the app and the metrics endpoint on already bound listeners until
/// `shutdown_token` is cancelled.
pub async fn serve(
    state: ServerState,
    listener: TcpListener,
    metrics_listener: TcpListener,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let app = make_app(state);

    let app_shutdown = shutdown_token.clone();
    let app_server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { app_shutdown.cancelled().await })
            .await
            .context("HTTP server failed")
    };

    let metrics_server = async move {
        axum::serve(metrics_listener, make_metrics_app())
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
            .await
            .context("Metrics server failed")
    };

    tokio::try_join!(app_server, metrics_server)?;
    Ok(())
}

pub async fn run_server(state: ServerState, shutdown_token: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = TcpListener::bind(("0.0.0.0", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    serve(state, listener, metrics_listener, shutdown_token).await
}
