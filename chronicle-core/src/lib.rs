//! Conversation history compression for long-running AI adventures.
//!
//! This crate provides:
//! - Marker scanning over a JSON conversation history
//! - Selection of the oldest block of location summaries to fold together
//! - Keyword-based event extraction that keeps critical moments in the prompt
//! - Chronicle synthesis through a pluggable chat model
//! - Splicing the chronicle into the history and persisting it safely
//!
//! # Quick Start
//!
//! ```ignore
//! use chronicle_core::{CompressionConfig, Compressor, OpenAiModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CompressionConfig::new()
//!         .with_trigger(12)
//!         .with_chunk_size(6);
//!     let model = OpenAiModel::from_env(&config)?;
//!
//!     let compressor = Compressor::new(config, model);
//!     if compressor.check_and_compress("conversation_history.json").await? {
//!         println!("History compressed");
//!     }
//!     Ok(())
//! }
//! ```

pub mod chronicle;
pub mod config;
pub mod digest;
pub mod events;
pub mod llm;
pub mod message;
pub mod persist;
pub mod pipeline;
pub mod retry;
pub mod rewriter;
pub mod scanner;
pub mod selector;
pub mod testing;

// Primary public API
pub use chronicle::{
    ChronicleSynthesizer, CompressionMetadata, CompressionResult, LocationSummarizer,
    SynthesisError, TransitionRecord,
};
pub use config::{CompressionConfig, ConfigError, WritePolicy};
pub use digest::{build_digest, Digest, DigestEntry};
pub use events::{extract_events, EventType, GameEvent, Importance};
pub use llm::{ChatModel, LlmError, OpenAiModel};
pub use message::{Message, MessageKind, Role};
pub use persist::{load_history, prune_backups, save_history, PersistError, WriteReport};
pub use pipeline::{
    compression_status, CompressionError, CompressionOutcome, CompressionRun, CompressionStatus,
    Compressor, FileCompression, RunState,
};
pub use retry::{Backoff, RetryPolicy};
pub use rewriter::{rewrite, Rewrite, RewriteError};
pub use scanner::{scan, MarkerScan, SummaryMarker};
pub use selector::{select_range, CompressionRange, Selection};
pub use testing::{HistoryBuilder, MockModel};
