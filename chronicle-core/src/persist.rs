//! Conversation history persistence.
//!
//! The history is read and written whole. Writes go through a temporary
//! sibling file and a rename, so an interrupted write never leaves a
//! truncated history behind. Where the compressed result goes is decided by
//! one explicit [`WritePolicy`].

use crate::config::{CompressionConfig, WritePolicy};
use crate::message::Message;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde_json::value::RawValue;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Timestamp format used in backup and sibling file names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("History file is not a JSON array of messages")]
    NotAnArray,
}

/// Where a compressed history ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub written: PathBuf,
    pub backup: Option<PathBuf>,
}

/// Load a conversation history.
pub async fn load_history(path: impl AsRef<Path>) -> Result<Vec<Message>, PersistError> {
    let content = fs::read_to_string(path).await?;
    if !content.trim_start().starts_with('[') {
        return Err(PersistError::NotAnArray);
    }

    let items: Vec<&RawValue> = serde_json::from_str(&content)?;
    items
        .into_iter()
        .map(|raw| Message::from_source(raw.get()).map_err(PersistError::from))
        .collect()
}

/// Serialize a history as a two-space indented JSON array.
///
/// Messages that still match the text they were loaded from are written back
/// verbatim, so an untouched message keeps its exact bytes.
pub fn render_history(messages: &[Message]) -> Result<String, PersistError> {
    if messages.is_empty() {
        return Ok("[]".to_string());
    }

    let mut out = String::from("[\n");
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str("  ");
        match message.unchanged_source() {
            Some(source) => out.push_str(source),
            None => out.push_str(&serde_json::to_string_pretty(message)?.replace('\n', "\n  ")),
        }
    }
    out.push_str("\n]");
    Ok(out)
}

/// Write a conversation history, replacing `path` atomically.
pub async fn save_history(path: impl AsRef<Path>, messages: &[Message]) -> Result<(), PersistError> {
    let path = path.as_ref();
    let content = render_history(messages)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Persist a compressed history according to `config.write_policy`.
pub async fn write_compressed(
    path: impl AsRef<Path>,
    messages: &[Message],
    config: &CompressionConfig,
) -> Result<WriteReport, PersistError> {
    let path = path.as_ref();

    match config.write_policy {
        WritePolicy::Sibling => {
            let target = unique_path(sibling_path(path, Local::now())).await;
            save_history(&target, messages).await?;
            tracing::info!(path = %target.display(), "wrote compressed history alongside source");
            Ok(WriteReport {
                written: target,
                backup: None,
            })
        }
        WritePolicy::OverwriteWithBackup => {
            let backup = if config.create_backups {
                Some(backup_history(path, &config.backup_dir_for(path)).await?)
            } else {
                None
            };
            save_history(path, messages).await?;
            tracing::info!(
                path = %path.display(),
                backup = ?backup.as_ref().map(|b| b.display().to_string()),
                "overwrote history"
            );
            Ok(WriteReport {
                written: path.to_path_buf(),
                backup,
            })
        }
    }
}

/// Copy `path` into `backup_dir` under a timestamped name.
pub async fn backup_history(path: &Path, backup_dir: &Path) -> Result<PathBuf, PersistError> {
    fs::create_dir_all(backup_dir).await?;
    let name = format!("{}_{}.json", file_stem(path), Local::now().format(TIMESTAMP_FORMAT));
    let target = unique_path(backup_dir.join(name)).await;
    fs::copy(path, &target).await?;
    Ok(target)
}

/// `<dir>/<stem>_compressed_<timestamp>.json` for a history at `path`.
pub fn sibling_path<Tz: TimeZone>(path: &Path, now: DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let name = format!(
        "{}_compressed_{}.json",
        file_stem(path),
        now.format(TIMESTAMP_FORMAT)
    );
    path.with_file_name(name)
}

/// Delete backups of `stem` in `dir` older than `retention_days`.
pub async fn prune_backups(
    dir: impl AsRef<Path>,
    stem: &str,
    retention_days: u32,
) -> Result<Vec<PathBuf>, PersistError> {
    prune_backups_at(dir, stem, retention_days, Local::now().naive_local()).await
}

/// `prune_backups` against an explicit clock.
///
/// Age comes from the timestamp in the file name; files whose name does not
/// carry one are never touched.
pub async fn prune_backups_at(
    dir: impl AsRef<Path>,
    stem: &str,
    retention_days: u32,
    now: NaiveDateTime,
) -> Result<Vec<PathBuf>, PersistError> {
    let dir = dir.as_ref();
    let mut removed = Vec::new();
    if !dir.exists() {
        return Ok(removed);
    }

    let Some(cutoff) = now.checked_sub_signed(chrono::Duration::days(i64::from(retention_days)))
    else {
        // Retention reaches past the earliest representable date
        return Ok(removed);
    };
    let prefix = format!("{stem}_");
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stamp) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|rest| rest.get(..15))
        else {
            continue;
        };
        let Ok(taken) = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) else {
            continue;
        };

        if taken < cutoff {
            fs::remove_file(&path).await?;
            tracing::debug!(path = %path.display(), "pruned old backup");
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "history".to_string())
}

/// `path`, or `path` with a numeric suffix if it already exists.
async fn unique_path(path: PathBuf) -> PathBuf {
    if !fs::try_exists(&path).await.unwrap_or(false) {
        return path;
    }
    let stem = file_stem(&path);
    let mut n = 1;
    loop {
        let candidate = path.with_file_name(format!("{stem}_{n}.json"));
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}
