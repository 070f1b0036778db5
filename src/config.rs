//! Engine configuration loaded from `config/flagscore.toml` and `FLAGSCORE__*` variables.

use ::config::{
    Config, Environment, File, FileFormat,
    builder::{ConfigBuilder, DefaultState},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Duration;

use crate::{core::freeze::CompetitionWindow, types::TimestampMs};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: {0}")]
    Source(#[from] ::config::ConfigError),
    #[error("invalid competition window: {0}")]
    InvalidWindow(String),
}

/// Competition and freeze boundaries as RFC 3339 timestamps.
#[derive(Debug, Deserialize, Clone)]
pub struct CompetitionConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub freeze_start: DateTime<Utc>,
    pub freeze_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub competition: CompetitionConfig,
    pub database: DatabaseConfig,
    /// Period of the background flag index refresh.
    pub flag_refresh_interval_ms: u64,
    /// Deadline budget for one caller request.
    pub request_timeout_ms: u64,
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            // Load from config/flagscore.toml
            .add_source(File::with_name("config/flagscore").required(false))
            // Override from environment (e.g., FLAGSCORE__COMPETITION__FREEZE_START)
            .add_source(
                Environment::with_prefix("FLAGSCORE")
                    .separator("__")
                    .try_parsing(true),
            );
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parses a TOML document layered over the defaults, without touching the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml));
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Converts the configured timestamps, rejecting inverted ranges.
    pub fn competition_window(&self) -> Result<CompetitionWindow, ConfigError> {
        let c = &self.competition;
        let window = CompetitionWindow {
            start_ms: to_ms(&c.start)?,
            end_ms: to_ms(&c.end)?,
            freeze_start_ms: to_ms(&c.freeze_start)?,
            freeze_end_ms: to_ms(&c.freeze_end)?,
        };
        if window.start_ms > window.end_ms {
            return Err(ConfigError::InvalidWindow(format!("start {} is after end {}", c.start, c.end)));
        }
        if window.freeze_start_ms > window.freeze_end_ms {
            return Err(ConfigError::InvalidWindow(format!(
                "freeze start {} is after freeze end {}",
                c.freeze_start, c.freeze_end
            )));
        }
        Ok(window)
    }

    pub fn flag_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.flag_refresh_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ::config::ConfigError> {
        Config::builder()
            .set_default("competition.start", "2019-12-20T20:00:00+00:00")?
            .set_default("competition.end", "2019-12-22T09:00:00+00:00")?
            .set_default("competition.freeze_start", "2019-12-22T08:00:00+00:00")?
            .set_default("competition.freeze_end", "2019-12-22T09:00:00+00:00")?
            .set_default("database.path", "flagscore.db")?
            .set_default("flag_refresh_interval_ms", 10_000)?
            .set_default("request_timeout_ms", 4_000)
    }
}

fn to_ms(at: &DateTime<Utc>) -> Result<TimestampMs, ConfigError> {
    TimestampMs::try_from(at.timestamp_millis())
        .map_err(|_| ConfigError::InvalidWindow(format!("{at} is before the Unix epoch")))
}
