use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use ledsync_state_lib::StripConfig;
use log::{info, warn, LevelFilter};
use serde::{Deserialize, Serialize};

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

/// Longest wait for the scratch buffer before a request is rejected
pub const MAX_BUFFER_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_buffer_timeout_ms")]
    pub buffer_timeout_ms: u64,
    #[serde(default = "default_strip")]
    pub strip: StripConfig,
}

const fn default_port() -> u16 {
    21324
}

const fn default_buffer_timeout_ms() -> u64 {
    1000
}

fn default_strip() -> StripConfig {
    StripConfig {
        total_leds: 60,
        ..StripConfig::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            port: default_port(),
            buffer_timeout_ms: default_buffer_timeout_ms(),
            strip: default_strip(),
        }
    }
}

impl ServerConfig {
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(mut config) => {
                info!("Loaded config from {}", path.display());
                config.validate();
                config
            }
            Err(e) => {
                warn!("Failed to load config: {e:#}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Clamp values to valid ranges
    pub fn validate(&mut self) {
        if self.buffer_timeout_ms > MAX_BUFFER_TIMEOUT_MS {
            warn!(
                "Clamping buffer_timeout_ms from {} to {MAX_BUFFER_TIMEOUT_MS}",
                self.buffer_timeout_ms
            );
            self.buffer_timeout_ms = MAX_BUFFER_TIMEOUT_MS;
        }
        self.strip.validate();
    }

    #[must_use]
    pub const fn buffer_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"log_level": "debug", "strip": {"total_leds": 144, "white_channel": true}}"#)
                .unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.port, 21324);
        assert_eq!(config.strip.total_leds, 144);
        assert!(config.strip.white_channel);
        assert_eq!(config.strip.max_segments, 16);
    }

    #[test]
    fn test_validate_clamps_timeout() {
        let mut config = ServerConfig {
            buffer_timeout_ms: 60_000,
            ..ServerConfig::default()
        };
        config.validate();
        assert_eq!(config.buffer_timeout(), Duration::from_millis(MAX_BUFFER_TIMEOUT_MS));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = ServerConfig::load_or_default(Some(Path::new("/nonexistent/ledsync.json")));
        assert_eq!(config.strip.total_leds, 60);
    }
}
