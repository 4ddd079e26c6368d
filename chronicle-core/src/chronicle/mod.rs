//! Model-backed summarization.
//!
//! Contains the chronicle synthesizer, the per-location summarizer and the
//! prompts they share.

pub mod location;
mod prompts;
pub mod synthesizer;

pub use location::{segment_since_boundary, LocationSummarizer, TransitionRecord};
pub use prompts::render_transcript;
pub use synthesizer::{
    estimate_tokens, ChronicleSynthesizer, CompressionMetadata, CompressionResult,
    SynthesisError,
};
