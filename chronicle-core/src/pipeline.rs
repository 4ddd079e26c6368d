//! The compression pipeline.
//!
//! One pass scans the history, selects a range, extracts events, synthesizes
//! a chronicle and splices it in. `Compressor` wires those stages to a model
//! and a configuration; file-level entry points add loading and persistence.
//! A failure at any stage leaves the history on disk untouched.

use crate::chronicle::{ChronicleSynthesizer, CompressionResult, SynthesisError};
use crate::config::{CompressionConfig, ConfigError, WritePolicy};
use crate::events::extract_events;
use crate::llm::ChatModel;
use crate::message::Message;
use crate::persist::{self, PersistError, WriteReport};
use crate::rewriter::{rewrite, RewriteError};
use crate::scanner::scan;
use crate::selector::{select_range, Selection};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Errors from a compression run.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),
}

// ============================================================================
// Run context
// ============================================================================

/// Stage of a compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Scanning,
    NoOp,
    RangeSelected,
    Synthesizing,
    Failed,
    Rewritten,
    Persisted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::NoOp | RunState::Failed | RunState::Persisted)
    }
}

/// Per-run context. Created at the start of a run and dropped at its end.
#[derive(Debug)]
pub struct CompressionRun {
    pub id: Uuid,
    state: RunState,
    started: Instant,
    history: Vec<(RunState, Duration)>,
}

impl CompressionRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
            started: Instant::now(),
            history: vec![(RunState::Idle, Duration::ZERO)],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, with the time since the run started.
    pub fn states(&self) -> &[(RunState, Duration)] {
        &self.history
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(run_id = %self.id, from = ?self.state, to = ?next, "compression run state");
        self.state = next;
        self.history.push((next, self.started.elapsed()));
    }
}

impl Default for CompressionRun {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Where the history stands with respect to compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionStatus {
    /// Plain summaries after the most recent chronicle.
    pub pending: usize,
    pub trigger: usize,
    pub chunk_size: usize,
    pub chronicles: usize,
    pub summaries: usize,
    pub transitions: usize,
    pub messages: usize,
    pub would_compress: bool,
}

impl fmt::Display for CompressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Messages:           {}", self.messages)?;
        writeln!(f, "Location summaries: {}", self.summaries)?;
        writeln!(f, "Chronicles:         {}", self.chronicles)?;
        writeln!(f, "Transitions:        {}", self.transitions)?;
        writeln!(
            f,
            "Pending summaries:  {} (trigger {}, chunk {})",
            self.pending, self.trigger, self.chunk_size
        )?;
        write!(
            f,
            "Compression:        {}",
            if self.would_compress { "needed" } else { "not needed" }
        )
    }
}

/// One in-memory compression pass.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub messages: Vec<Message>,
    pub result: CompressionResult,
    /// Range that was replaced.
    pub start: usize,
    pub end: usize,
    /// New index of the transition kept just after the chronicle.
    pub preserved_transition: Option<usize>,
}

/// A compressed history written to disk.
#[derive(Debug, Clone)]
pub struct FileCompression {
    /// One result per pass, in order.
    pub passes: Vec<CompressionResult>,
    pub report: WriteReport,
    pub pruned_backups: usize,
}

/// Report the compression state of `messages` under `config`.
pub fn compression_status(messages: &[Message], config: &CompressionConfig) -> CompressionStatus {
    let scan = scan(messages);
    let selection = select_range(&scan, config);
    let pending = match &selection {
        Selection::NotNeeded { pending, .. } => *pending,
        Selection::Selected(_) => scan.summaries_after_chronicle().len(),
    };

    CompressionStatus {
        pending,
        trigger: config.compression_trigger,
        chunk_size: config.chunk_size,
        chronicles: scan.ai_chronicles.len(),
        summaries: scan.location_summaries.len(),
        transitions: scan.transitions.len(),
        messages: messages.len(),
        would_compress: selection.range().is_some(),
    }
}

// ============================================================================
// Compressor
// ============================================================================

/// Runs compression passes with one configuration and one model.
pub struct Compressor<M: ChatModel> {
    config: CompressionConfig,
    model: M,
}

impl<M: ChatModel> Compressor<M> {
    pub fn new(config: CompressionConfig, model: M) -> Self {
        Self { config, model }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Report the compression state of `messages` without changing anything.
    pub fn status(&self, messages: &[Message]) -> CompressionStatus {
        compression_status(messages, &self.config)
    }

    /// Run one pass over `messages` in memory.
    ///
    /// Returns `None` when compression is not needed.
    pub async fn compress_messages(
        &self,
        messages: &[Message],
    ) -> Result<Option<CompressionOutcome>, CompressionError> {
        self.config.validate()?;
        let mut run = CompressionRun::new();
        self.pass(&mut run, messages).await
    }

    async fn pass(
        &self,
        run: &mut CompressionRun,
        messages: &[Message],
    ) -> Result<Option<CompressionOutcome>, CompressionError> {
        run.advance(RunState::Scanning);
        let scan = scan(messages);

        let range = match select_range(&scan, &self.config) {
            Selection::NotNeeded { pending, trigger } => {
                run.advance(RunState::NoOp);
                tracing::debug!(run_id = %run.id, pending, trigger, "compression not needed");
                return Ok(None);
            }
            Selection::Selected(range) => range,
        };

        run.advance(RunState::RangeSelected);
        tracing::info!(
            run_id = %run.id,
            start = range.start,
            end = range.end,
            from = range.start_location(),
            to = range.end_location(),
            "selected range for compression"
        );

        let block = messages.get(range.start..=range.end).unwrap_or_default();
        let events = extract_events(block, range.start_location());

        run.advance(RunState::Synthesizing);
        let synthesizer = ChronicleSynthesizer::new(&self.model, &self.config.retry)
            .with_events_per_category(self.config.events_per_category);

        let result = match synthesizer.synthesize(run.id, &range, messages, &events).await {
            Ok(result) => result,
            Err(e) => {
                run.advance(RunState::Failed);
                tracing::error!(run_id = %run.id, error = %e, "chronicle synthesis failed");
                return Err(e.into());
            }
        };

        let rewritten = match rewrite(messages.to_vec(), range.start, range.end, result.to_message()) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                run.advance(RunState::Failed);
                tracing::error!(run_id = %run.id, error = %e, "history rewrite failed");
                return Err(e.into());
            }
        };

        run.advance(RunState::Rewritten);
        tracing::info!(
            run_id = %run.id,
            before = messages.len(),
            after = rewritten.messages.len(),
            original_tokens = result.original_tokens,
            summary_tokens = result.summary_tokens,
            ratio = result.compression_ratio,
            "history compressed"
        );

        Ok(Some(CompressionOutcome {
            messages: rewritten.messages,
            start: rewritten.start,
            end: rewritten.end,
            preserved_transition: rewritten.preserved_transition,
            result,
        }))
    }

    /// Compress the history at `path` if needed, persisting per the write policy.
    ///
    /// Returns `false` without touching the file when auto compression is off
    /// or too few summaries are pending.
    pub async fn check_and_compress(&self, path: impl AsRef<Path>) -> Result<bool, CompressionError> {
        Ok(self.compress_file(path.as_ref(), 1).await?.is_some())
    }

    /// Run passes until none applies or `max_passes` is reached.
    ///
    /// All passes happen in memory and the result is written once. Returns
    /// the number of passes applied.
    pub async fn compress_until_settled(
        &self,
        path: impl AsRef<Path>,
        max_passes: usize,
    ) -> Result<usize, CompressionError> {
        Ok(self
            .compress_file(path.as_ref(), max_passes)
            .await?
            .map_or(0, |done| done.passes.len()))
    }

    /// Load, compress up to `max_passes` times, and persist.
    ///
    /// Returns `None` when nothing was written.
    pub async fn compress_file(
        &self,
        path: &Path,
        max_passes: usize,
    ) -> Result<Option<FileCompression>, CompressionError> {
        if !self.config.enable_auto_compression {
            tracing::debug!(path = %path.display(), "auto compression disabled");
            return Ok(None);
        }
        self.config.validate()?;

        let mut run = CompressionRun::new();
        let mut messages = persist::load_history(path).await?;
        let mut passes = Vec::new();

        while passes.len() < max_passes {
            match self.pass(&mut run, &messages).await? {
                Some(outcome) => {
                    messages = outcome.messages;
                    passes.push(outcome.result);
                }
                None => break,
            }
        }

        if passes.is_empty() {
            return Ok(None);
        }

        let report = persist::write_compressed(path, &messages, &self.config).await?;
        run.advance(RunState::Persisted);

        let pruned_backups = if report.backup.is_some() {
            self.prune(path).await
        } else {
            0
        };

        tracing::info!(
            run_id = %run.id,
            passes = passes.len(),
            path = %report.written.display(),
            elapsed_ms = run.elapsed().as_millis() as u64,
            "compressed history persisted"
        );

        Ok(Some(FileCompression {
            passes,
            report,
            pruned_backups,
        }))
    }

    /// Prune old backups of `path`; failures are logged, not returned.
    async fn prune(&self, path: &Path) -> usize {
        if self.config.write_policy != WritePolicy::OverwriteWithBackup {
            return 0;
        }
        let dir = self.config.backup_dir_for(path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match persist::prune_backups(&dir, &stem, self.config.backup_retention_days).await {
            Ok(removed) => removed.len(),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to prune backups");
                0
            }
        }
    }
}
