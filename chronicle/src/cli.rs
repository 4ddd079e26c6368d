//! Command-line arguments.

use chronicle_core::{CompressionConfig, WritePolicy};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "chronicle.toml";

#[derive(Parser, Debug)]
#[command(name = "chronicle", version, about = "Compress adventure histories into chronicles")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that override values from the config file.
#[derive(Args, Debug, Default)]
pub struct Settings {
    /// TOML config file.
    #[arg(long, global = true, env = "CHRONICLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pending summaries needed before compressing.
    #[arg(long, global = true)]
    pub trigger: Option<usize>,

    /// Summaries folded into one chronicle.
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Chat model identifier.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Write a timestamped sibling file instead of overwriting the history.
    #[arg(long, global = true)]
    pub sibling: bool,

    /// Skip the backup copy when overwriting.
    #[arg(long, global = true)]
    pub no_backup: bool,

    /// Directory for backups.
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how far the history is from its next compression.
    Check {
        history: PathBuf,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compress the history if enough summaries are pending.
    Compress {
        history: PathBuf,
        /// Keep compressing until nothing is left to fold, up to this many passes.
        #[arg(long, default_value_t = 1)]
        max_passes: usize,
        /// Compress even when auto compression is disabled in the config.
        #[arg(long)]
        force: bool,
    },
    /// Summarize the current location and record a move to a new one.
    Transition {
        history: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Print the adventure so far.
    Digest {
        history: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Delete backups older than the retention window.
    PruneBackups { history: PathBuf },
}

impl Settings {
    /// Resolve the configuration: file (if any), then flag overrides.
    pub fn resolve(&self) -> anyhow::Result<CompressionConfig> {
        let mut config = match &self.config {
            Some(path) => CompressionConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                CompressionConfig::load(DEFAULT_CONFIG_FILE)?
            }
            None => CompressionConfig::new(),
        };

        if let Some(trigger) = self.trigger {
            config = config.with_trigger(trigger);
        }
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if self.sibling {
            config = config.with_write_policy(WritePolicy::Sibling);
        }
        if self.no_backup {
            config = config.with_backups(false);
        }
        if let Some(dir) = &self.backup_dir {
            config = config.with_backup_dir(dir.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
