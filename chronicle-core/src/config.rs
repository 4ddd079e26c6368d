//! Compression configuration.
//!
//! One configuration value is injected into every component; there are no
//! module-level settings. Values can be built in code with the `with_*`
//! methods or loaded from a TOML file in which every key is optional.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on `backup_retention_days` (a century).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where compressed history is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Write a new timestamped file next to the source; never touch the source.
    Sibling,
    /// Copy the source to the backup directory, then overwrite it.
    #[default]
    OverwriteWithBackup,
}

/// Settings for the compression pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Pending plain summaries needed before a pass runs.
    pub compression_trigger: usize,

    /// Plain summaries folded into one chronicle per pass.
    pub chunk_size: usize,

    /// Master switch for `check_and_compress`.
    pub enable_auto_compression: bool,

    /// Copy the source before overwriting it.
    pub create_backups: bool,

    /// Backups older than this are pruned.
    pub backup_retention_days: u32,

    /// Directory for backups; defaults to `backups/` next to the history file.
    pub backup_dir: Option<PathBuf>,

    pub write_policy: WritePolicy,

    /// Model identifier passed to the chat endpoint.
    pub model: String,

    pub temperature: f32,

    /// Maximum tokens for a generated chronicle; `None` leaves it to the model.
    pub max_tokens: Option<usize>,

    /// Cap on extracted events listed per category in the prompt.
    pub events_per_category: usize,

    pub retry: RetryPolicy,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            compression_trigger: 12,
            chunk_size: 6,
            enable_auto_compression: true,
            create_backups: true,
            backup_retention_days: 7,
            backup_dir: None,
            write_policy: WritePolicy::OverwriteWithBackup,
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            events_per_category: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl CompressionConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from TOML text and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.backup_retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "backup_retention_days {} exceeds {MAX_RETENTION_DAYS}",
                self.backup_retention_days
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }

    pub fn with_trigger(mut self, trigger: usize) -> Self {
        self.compression_trigger = trigger;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_auto_compression(mut self, enabled: bool) -> Self {
        self.enable_auto_compression = enabled;
        self
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.create_backups = enabled;
        self
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.backup_retention_days = days;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Backup directory for a history file at `history_path`.
    pub fn backup_dir_for(&self, history_path: &Path) -> PathBuf {
        match self.backup_dir {
            Some(ref dir) => dir.clone(),
            None => history_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("backups"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CompressionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compression_trigger, 12);
        assert_eq!(config.chunk_size, 6);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 2_000);
    }

    #[test]
    fn test_partial_toml() {
        let config = CompressionConfig::from_toml(
            r#"
            compression_trigger = 15
            chunk_size = 8
            write_policy = "sibling"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.compression_trigger, 15);
        assert_eq!(config.chunk_size, 8);
        assert_eq!(config.write_policy, WritePolicy::Sibling);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_ms, 2_000);
        assert!(config.enable_auto_compression);
    }

    #[test]
    fn test_validation() {
        let zero_chunk = CompressionConfig::new().with_chunk_size(0);
        assert!(matches!(zero_chunk.validate(), Err(ConfigError::Invalid(_))));

        let hot = CompressionConfig::new().with_temperature(3.5);
        assert!(hot.validate().is_err());

        let forever = CompressionConfig::new().with_retention_days(MAX_RETENTION_DAYS + 1);
        assert!(forever.validate().is_err());
        assert!(CompressionConfig::from_toml("backup_retention_days = 100000000").is_err());
    }

    #[test]
    fn test_trigger_below_chunk_size_is_valid() {
        let config = CompressionConfig::new().with_trigger(5).with_chunk_size(8);
        assert!(config.validate().is_ok());
        assert!(CompressionConfig::from_toml("chunk_size = 20").is_ok());
    }

    #[test]
    fn test_backup_dir_for() {
        let config = CompressionConfig::new();
        assert_eq!(
            config.backup_dir_for(Path::new("/game/modules/conversation_history.json")),
            PathBuf::from("/game/modules/backups")
        );

        let custom = CompressionConfig::new().with_backup_dir("/tmp/bk");
        assert_eq!(
            custom.backup_dir_for(Path::new("history.json")),
            PathBuf::from("/tmp/bk")
        );
    }
}
