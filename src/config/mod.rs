//! Configuration management.
//!
//! Configuration is read from `~/.config/vignette/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is
//! created. Missing fields fall back to their defaults.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::extractor::ScoringConfig;
use crate::fetcher::FetcherConfig;
use crate::scheduler::SchedulerConfig;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub scheduler: SchedulerConfig,
    pub scoring: ScoringConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/vignette/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("vignette").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let default_config = Self::default_config_content();

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(default_config.as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Vignette configuration

[fetcher]
# Per-request timeout in seconds
timeout_secs = 15

# Accept header sent with page and stylesheet fetches
accept = "text/html,application/xhtml+xml,*/*;q=0.9"
accept_language = "en-US,en;q=0.9"

[scheduler]
# Maximum simultaneously in-flight page fetches
concurrency = 3

# Look-ahead distance (px) at which a card's fetch is triggered
lookahead_margin_px = 400

[scoring]
# Fallback <img> scoring weights. Empirical; tune with care.
hero_bonus = 15.0
decorative_penalty = 25.0
width_divisor = 50.0
width_cap = 12.0
height_divisor = 80.0
height_cap = 8.0
min_width_px = 80
small_width_penalty = 20.0
accept_threshold = 5.0
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.scheduler.concurrency, 3);
        assert_eq!(config.fetcher.timeout_secs, 15);
        assert_eq!(config.scoring.accept_threshold, 5.0);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[scheduler]
concurrency = 6
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        // Custom value
        assert_eq!(config.scheduler.concurrency, 6);
        // Default values
        assert_eq!(config.scheduler.lookahead_margin_px, 400);
        assert_eq!(config.fetcher.timeout_secs, 15);
    }
}
