//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases, bound to random
//! ports on localhost.

use super::constants::*;
use super::fixtures::seed_artist;
use greenbox_server::publishing::{ReleasePublisher, TriggerAuthenticator, TriggerSecrets};
use greenbox_server::server::server::serve;
use greenbox_server::server::state::ServerState;
use greenbox_server::server::{RequestsLoggingLevel, ServerConfig};
use greenbox_server::SqliteGreenboxStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with an isolated database
///
/// When dropped, the server shuts down and the temp directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Base URL of the metrics server
    pub metrics_url: String,

    /// Store for seeding and direct inspection in tests
    pub store: Arc<SqliteGreenboxStore>,

    _temp_db_dir: TempDir,
    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a server with all trigger secrets configured and the seeded
    /// artist and followers in place.
    pub async fn spawn() -> Self {
        Self::spawn_with_secrets(TriggerSecrets {
            cron_secret: Some(CRON_SECRET.to_string()),
            service_role_key: Some(SERVICE_ROLE_KEY.to_string()),
            anon_key: Some(ANON_KEY.to_string()),
        })
        .await
    }

    pub async fn spawn_with_secrets(secrets: TriggerSecrets) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteGreenboxStore::new(temp_db_dir.path().join("greenbox.db"))
                .expect("Failed to open store"),
        );
        seed_artist(&store).expect("Failed to seed artist");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let metrics_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind metrics port");
        let port = listener.local_addr().expect("No local address").port();
        let metrics_port = metrics_listener
            .local_addr()
            .expect("No local address")
            .port();

        let state = ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                port,
                metrics_port,
                play_threshold: Duration::from_secs(PLAY_THRESHOLD_SECS),
            },
            start_time: Instant::now(),
            hash: "test".to_string(),
            release_store: store.clone(),
            analytics_store: store.clone(),
            publisher: Arc::new(ReleasePublisher::new(store.clone(), store.clone())),
            authenticator: Arc::new(TriggerAuthenticator::new(secrets)),
        };

        let shutdown_token = CancellationToken::new();
        let server_token = shutdown_token.clone();
        tokio::spawn(async move {
            serve(state, listener, metrics_listener, server_token)
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            metrics_url: format!("http://127.0.0.1:{}", metrics_port),
            store,
            _temp_db_dir: temp_db_dir,
            shutdown_token,
        };

        server.wait_for_ready().await;

        server
    }

    /// Polls the home endpoint until it answers
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
