use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use greenbox_server::background_jobs::jobs::ScheduledReleaseJob;
use greenbox_server::background_jobs::JobScheduler;
use greenbox_server::config::{AppConfig, CliConfig, FileConfig};
use greenbox_server::publishing::{ReleasePublisher, TriggerAuthenticator};
use greenbox_server::server::{metrics, state::ServerState, ServerConfig};
use greenbox_server::{run_server, RequestsLoggingLevel, SqliteGreenboxStore, SqliteServerStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding greenbox.db and server.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the CLI ones.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Seconds between in-process publishing runs. 0 leaves publishing to the
    /// external cron trigger.
    #[clap(long, default_value_t = 60)]
    pub publish_interval_secs: u64,

    /// Seconds a song must play before it counts as a play.
    #[clap(long)]
    pub play_threshold_secs: Option<u64>,

    #[clap(long, env = "GREENBOX_CRON_SECRET", hide_env_values = true)]
    pub cron_secret: Option<String>,

    #[clap(long, env = "GREENBOX_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub service_role_key: Option<String>,

    /// Deprecated fallback credential for the publishing trigger.
    #[clap(long, env = "GREENBOX_ANON_KEY", hide_env_values = true)]
    pub anon_key: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            publish_interval_secs: self.publish_interval_secs,
            play_threshold_secs: self.play_threshold_secs,
            cron_secret: self.cron_secret.clone(),
            service_role_key: self.service_role_key.clone(),
            anon_key: self.anon_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!(
        "Opening GreenBox database at {:?}...",
        config.greenbox_db_path()
    );
    let store = Arc::new(SqliteGreenboxStore::new(config.greenbox_db_path())?);
    let server_store = Arc::new(SqliteServerStore::new(config.server_db_path())?);

    let publisher = Arc::new(ReleasePublisher::new(store.clone(), store.clone()));
    let authenticator = Arc::new(TriggerAuthenticator::new(
        config.publishing.secrets.clone(),
    ));
    info!(
        "Play threshold for client sessions: {:?}",
        config.play_threshold
    );

    let shutdown_token = CancellationToken::new();

    let scheduler_task = match config.publishing.interval {
        Some(interval) => {
            info!("Publishing scheduled songs every {:?}", interval);
            let mut scheduler = JobScheduler::new(server_store.clone(), shutdown_token.clone());
            scheduler.register_job(Arc::new(ScheduledReleaseJob::new(
                publisher.clone(),
                interval,
            )));
            Some(tokio::spawn(async move { scheduler.run().await }))
        }
        None => {
            info!("In-process publishing disabled, relying on the trigger endpoint");
            None
        }
    };

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down..."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        signal_token.cancel();
    });

    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            metrics_port: config.metrics_port,
            play_threshold: config.play_threshold,
        },
        start_time: Instant::now(),
        hash: env!("GREENBOX_GIT_HASH").to_string(),
        release_store: store.clone(),
        analytics_store: store,
        publisher,
        authenticator,
    };

    let result = run_server(state, shutdown_token.clone()).await;
    shutdown_token.cancel();

    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            error!("Scheduler task failed: {}", e);
        }
    }

    result
}
