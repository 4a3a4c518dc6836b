mod file_config;

pub use file_config::{FileConfig, PublishingConfig};

use crate::play_tracking::DEFAULT_PLAY_THRESHOLD;
use crate::publishing::TriggerSecrets;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub publish_interval_secs: u64,
    pub play_threshold_secs: Option<u64>,
    pub cron_secret: Option<String>,
    pub service_role_key: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// Listening time after which a play is counted.
    pub play_threshold: Duration,
    pub publishing: PublishingSettings,
}

#[derive(Debug, Clone)]
pub struct PublishingSettings {
    /// Interval of the in-process publishing job, `None` when disabled.
    pub interval: Option<Duration>,
    pub secrets: TriggerSecrets,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let play_threshold = file
            .play_threshold_secs
            .or(cli.play_threshold_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PLAY_THRESHOLD);
        if play_threshold.is_zero() {
            bail!("play_threshold_secs must be greater than zero");
        }

        let pub_file = file.publishing.unwrap_or_default();
        let interval_secs = pub_file.interval_secs.unwrap_or(cli.publish_interval_secs);
        let publishing = PublishingSettings {
            interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
            secrets: TriggerSecrets {
                cron_secret: non_empty(pub_file.cron_secret.or_else(|| cli.cron_secret.clone())),
                service_role_key: non_empty(
                    pub_file
                        .service_role_key
                        .or_else(|| cli.service_role_key.clone()),
                ),
                anon_key: non_empty(pub_file.anon_key.or_else(|| cli.anon_key.clone())),
            },
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            play_threshold,
            publishing,
        })
    }

    pub fn greenbox_db_path(&self) -> PathBuf {
        self.db_dir.join("greenbox.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
