//! Chronicle command-line tool.
//!
//! Inspects and compresses adventure conversation histories.
//!
//! ```bash
//! chronicle check conversation_history.json
//! chronicle compress conversation_history.json --max-passes 4
//! chronicle transition conversation_history.json --from "Old Mill" --to "River Ford"
//! ```
//!
//! Logging: set `RUST_LOG=chronicle_core=debug` to see each pipeline stage on stderr.

mod cli;

use anyhow::Context;
use chronicle_core::{
    build_digest, compression_status, load_history, prune_backups, save_history,
    CompressionConfig, Compressor, LocationSummarizer, OpenAiModel,
};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "chronicle=debug,chronicle_core=debug"
        } else {
            "chronicle=info,chronicle_core=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = cli.settings.resolve()?;

    match cli.command {
        Command::Check { history, json } => check(&history, config, json).await,
        Command::Compress {
            history,
            max_passes,
            force,
        } => {
            let enabled = force || config.enable_auto_compression;
            compress(&history, config.with_auto_compression(enabled), max_passes).await
        }
        Command::Transition { history, from, to } => transition(&history, config, &from, &to).await,
        Command::Digest { history, json } => digest(&history, json).await,
        Command::PruneBackups { history } => prune(&history, &config).await,
    }
}

async fn check(path: &Path, config: CompressionConfig, json: bool) -> anyhow::Result<()> {
    let messages = load_history(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;

    let status = compression_status(&messages, &config);
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{status}");
    }
    Ok(())
}

async fn compress(path: &Path, config: CompressionConfig, max_passes: usize) -> anyhow::Result<()> {
    let model = OpenAiModel::from_env(&config).context("failed to create chat client")?;
    let compressor = Compressor::new(config, model);

    match compressor.compress_file(path, max_passes.max(1)).await? {
        Some(done) => {
            for (i, pass) in done.passes.iter().enumerate() {
                println!(
                    "Pass {}: {} -> {} ({} summaries, {} -> {} tokens)",
                    i + 1,
                    pass.locations_covered.first().map(String::as_str).unwrap_or("?"),
                    pass.locations_covered.last().map(String::as_str).unwrap_or("?"),
                    pass.metadata.summaries_compressed,
                    pass.original_tokens,
                    pass.summary_tokens,
                );
            }
            println!("Wrote {}", done.report.written.display());
            if let Some(backup) = &done.report.backup {
                println!("Backup {}", backup.display());
            }
            if done.pruned_backups > 0 {
                println!("Pruned {} old backup(s)", done.pruned_backups);
            }
        }
        None => println!("No compression needed."),
    }
    Ok(())
}

async fn transition(
    path: &Path,
    config: CompressionConfig,
    from: &str,
    to: &str,
) -> anyhow::Result<()> {
    let mut messages = load_history(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;

    let model = OpenAiModel::from_env(&config).context("failed to create chat client")?;
    let record = LocationSummarizer::new(&model, &config.retry)
        .record_transition(&mut messages, from, to)
        .await?;
    save_history(path, &messages).await?;

    match record.summary_index {
        Some(index) => println!("Summarized {from} at message {index}"),
        None => println!("Nothing to summarize for {from}"),
    }
    println!("Recorded transition to {to}");

    let compressor = Compressor::new(config, model);
    if compressor.check_and_compress(path).await? {
        println!("History compressed");
    }
    Ok(())
}

async fn digest(path: &Path, json: bool) -> anyhow::Result<()> {
    let messages = load_history(path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;

    let digest = build_digest(&messages);
    if json {
        println!("{}", serde_json::to_string_pretty(&digest)?);
    } else {
        print!("{}", digest.render());
    }
    Ok(())
}

async fn prune(path: &Path, config: &CompressionConfig) -> anyhow::Result<()> {
    let dir = config.backup_dir_for(path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .context("history path has no file name")?;

    let removed = prune_backups(&dir, &stem, config.backup_retention_days).await?;
    for file in &removed {
        println!("Removed {}", file.display());
    }
    println!("Pruned {} backup(s) from {}", removed.len(), dir.display());
    Ok(())
}
