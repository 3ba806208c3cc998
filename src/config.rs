//! Application configuration.
//!
//! Handles loading configuration from environment variables and .env files.

use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::simulator::DEFAULT_INTERVAL_MS;
use crate::error::{Error, Result};
use crate::playlist::integrity::IntegrityMode;

/// Where cue triggers come from during a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CueSourceMode {
    /// Manual or auto-playback simulator.
    #[default]
    Simulator,
    /// In-venue proximity beacons.
    Beacon,
}

impl FromStr for CueSourceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulator" => Ok(Self::Simulator),
            "beacon" | "ble" => Ok(Self::Beacon),
            other => Err(Error::config(
                format!("Unknown cue source '{other}'"),
                "Set THEATER_CUE_SOURCE to 'simulator' or 'beacon'",
            )),
        }
    }
}

impl FromStr for IntegrityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "warn" => Ok(Self::Warn),
            other => Err(Error::config(
                format!("Unknown integrity mode '{other}'"),
                "Set THEATER_INTEGRITY to 'enforce' or 'warn'",
            )),
        }
    }
}

/// Configuration for the application.
#[derive(Debug, Clone)]
pub struct Config {
    /// The application name
    app_name: String,
    /// The application version
    app_version: String,
    /// Root directory of the playlist store
    pub data_dir: PathBuf,
    /// Cue source used when a show starts
    pub cue_source: CueSourceMode,
    /// Period between auto-played cues
    pub auto_interval_ms: u64,
    /// Timeout for playlist downloads
    pub fetch_timeout_secs: u64,
    /// Whether integrity failures reject a playlist
    pub integrity: IntegrityMode,
    /// Where the show runner writes its log
    pub log_file: PathBuf,
    /// Captured beacon traffic replayed in beacon mode
    pub beacon_replay: Option<PathBuf>,
}

impl Config {
    /// Get the application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Get the application version.
    #[must_use]
    pub fn app_version(&self) -> &str {
        &self.app_version
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(env::temp_dir)
            .join(env!("CARGO_PKG_NAME"));
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_file: data_dir.join("theater-cue.log"),
            data_dir,
            cue_source: CueSourceMode::default(),
            auto_interval_ms: DEFAULT_INTERVAL_MS,
            fetch_timeout_secs: 30,
            integrity: IntegrityMode::default(),
            beacon_replay: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("THEATER_DATA_DIR") {
            config.data_dir = expand(&dir);
            config.log_file = config.data_dir.join("theater-cue.log");
        }

        if let Some(source) = lookup("THEATER_CUE_SOURCE") {
            config.cue_source = source.parse()?;
        }

        if let Some(mode) = lookup("THEATER_INTEGRITY") {
            config.integrity = mode.parse()?;
        }

        if let Some(value) = lookup("THEATER_AUTO_INTERVAL_MS") {
            match value.parse::<u64>() {
                Ok(ms) if ms > 0 => config.auto_interval_ms = ms,
                _ => tracing::warn!(value, "Ignoring invalid THEATER_AUTO_INTERVAL_MS"),
            }
        }

        if let Some(value) = lookup("THEATER_FETCH_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) if secs > 0 => config.fetch_timeout_secs = secs,
                _ => tracing::warn!(value, "Ignoring invalid THEATER_FETCH_TIMEOUT_SECS"),
            }
        }

        if let Some(path) = lookup("THEATER_LOG_FILE") {
            config.log_file = expand(&path);
        }

        config.beacon_replay = lookup("THEATER_BEACON_REPLAY").map(|path| expand(&path));

        Ok(config)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
