//! Chronicle synthesis.
//!
//! Turns a selected block of history into one chronicle message by asking the
//! model for a single paragraph that names every covered location in order.

use super::prompts::{chronicle_prompt, render_transcript, CHRONICLE_SYSTEM_PROMPT};
use crate::events::{format_events, EventType, GameEvent};
use crate::llm::{ChatModel, LlmError};
use crate::message::{chronicle_content, Message, MessageKind, Role};
use crate::retry::RetryPolicy;
use crate::selector::CompressionRange;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors from synthesis.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("range {start}..={end} is outside a history of {len} messages")]
    InvalidRange { start: usize, end: usize, len: usize },
}

/// Rough token estimate: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Bookkeeping about one synthesized chronicle.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionMetadata {
    pub run_id: Uuid,
    pub start_index: usize,
    pub end_index: usize,
    pub summaries_compressed: usize,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// A synthesized chronicle and how much it saved.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    /// Full content of the replacement message, markers included.
    pub summary: String,
    pub original_tokens: usize,
    pub summary_tokens: usize,
    /// `summary_tokens / original_tokens`; reported, not enforced.
    pub compression_ratio: f64,
    pub events_preserved: usize,
    pub locations_covered: Vec<String>,
    pub metadata: CompressionMetadata,
}

impl CompressionResult {
    /// The message that replaces the compressed range.
    pub fn to_message(&self) -> Message {
        Message::tagged(Role::Assistant, self.summary.clone(), MessageKind::Chronicle)
    }
}

/// Produces chronicle entries with a model and a retry policy.
pub struct ChronicleSynthesizer<'a, M: ChatModel + ?Sized> {
    model: &'a M,
    retry: &'a RetryPolicy,
    events_per_category: usize,
}

impl<'a, M: ChatModel + ?Sized> ChronicleSynthesizer<'a, M> {
    pub fn new(model: &'a M, retry: &'a RetryPolicy) -> Self {
        Self {
            model,
            retry,
            events_per_category: 5,
        }
    }

    pub fn with_events_per_category(mut self, cap: usize) -> Self {
        self.events_per_category = cap;
        self
    }

    /// Synthesize a chronicle for `range` of `history`.
    ///
    /// Transport failures and empty replies are retried per the policy; once
    /// attempts run out the error is returned and nothing should be written.
    pub async fn synthesize(
        &self,
        run_id: Uuid,
        range: &CompressionRange,
        history: &[Message],
        events: &[GameEvent],
    ) -> Result<CompressionResult, SynthesisError> {
        if range.start > range.end || range.end >= history.len() {
            return Err(SynthesisError::InvalidRange {
                start: range.start,
                end: range.end,
                len: history.len(),
            });
        }

        let block = &history[range.start..=range.end];
        let locations = range.locations();
        let events_block = format_events(events, self.events_per_category);
        let user = chronicle_prompt(&locations, &events_block, &render_transcript(block));

        tracing::info!(
            start = range.start,
            end = range.end,
            locations = locations.len(),
            events = events.len(),
            "synthesizing chronicle"
        );

        let prose = self
            .retry
            .run_while("chronicle synthesis", LlmError::is_transient, |_| {
                let user = user.as_str();
                async move {
                    match self.model.complete(CHRONICLE_SYSTEM_PROMPT, user).await {
                        Ok(reply) if !reply.trim().is_empty() => Ok(reply.trim().to_string()),
                        Ok(_) => Err(LlmError::EmptyReply),
                        Err(e) => Err(e),
                    }
                }
            })
            .await
            .map_err(|(attempts, source)| SynthesisError::Exhausted { attempts, source })?;

        let summary = chronicle_content(&prose);
        let original_tokens: usize = block.iter().map(|m| estimate_tokens(&m.content)).sum();
        let summary_tokens = estimate_tokens(&summary);
        let compression_ratio = if original_tokens == 0 {
            0.0
        } else {
            summary_tokens as f64 / original_tokens as f64
        };

        let events_preserved = EventType::ALL
            .iter()
            .map(|t| {
                events
                    .iter()
                    .filter(|e| e.event_type == *t)
                    .count()
                    .min(self.events_per_category)
            })
            .sum();

        Ok(CompressionResult {
            summary,
            original_tokens,
            summary_tokens,
            compression_ratio,
            events_preserved,
            locations_covered: locations.iter().map(|l| l.to_string()).collect(),
            metadata: CompressionMetadata {
                run_id,
                start_index: range.start,
                end_index: range.end,
                summaries_compressed: range.summaries.len(),
                model: self.model.model_name().to_string(),
                created_at: Utc::now(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionConfig;
    use crate::message::{CHRONICLE_MARKER, LOCATION_SUMMARY_MARKER};
    use crate::scanner::scan;
    use crate::selector::select_range;
    use crate::testing::{HistoryBuilder, MockModel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects every request the way the API does for a bad key.
    #[derive(Default)]
    struct Unauthorized {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for Unauthorized {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Api(chat::Error::Api {
                status: 401,
                message: "Incorrect API key provided".into(),
            }))
        }

        fn model_name(&self) -> &str {
            "unauthorized"
        }
    }

    fn range_for(history: &[Message]) -> CompressionRange {
        let config = CompressionConfig::new().with_trigger(3).with_chunk_size(3);
        select_range(&scan(history), &config).range().cloned().unwrap()
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[tokio::test]
    async fn test_synthesize_marks_chronicle() {
        let history = HistoryBuilder::new().locations(3).build();
        let range = range_for(&history);
        let model = MockModel::new(vec![Ok("  The party crossed three lands.  ".into())]);
        let retry = RetryPolicy::immediate(3);

        let result = ChronicleSynthesizer::new(&model, &retry)
            .synthesize(Uuid::new_v4(), &range, &history, &[])
            .await
            .unwrap();

        assert!(result.summary.starts_with(LOCATION_SUMMARY_MARKER));
        assert!(result.summary.ends_with(&format!("\n\n{CHRONICLE_MARKER}")));
        assert!(result.summary.contains("The party crossed three lands."));
        assert_eq!(result.locations_covered, vec!["Location 1", "Location 2", "Location 3"]);
        assert_eq!(result.metadata.summaries_compressed, 3);
        assert_eq!(result.metadata.model, "mock-model");
        assert!(result.original_tokens > 0);
        assert!(result.to_message().is_chronicle());

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1.contains("Location 1 -> Location 2 -> Location 3"));
    }

    #[tokio::test]
    async fn test_retries_empty_and_failed_replies() {
        let history = HistoryBuilder::new().locations(3).build();
        let range = range_for(&history);
        let model = MockModel::new(vec![
            Err("connection reset".into()),
            Ok("   ".into()),
            Ok("At last, a chronicle.".into()),
        ]);
        let retry = RetryPolicy::immediate(3);

        let result = ChronicleSynthesizer::new(&model, &retry)
            .synthesize(Uuid::new_v4(), &range, &history, &[])
            .await
            .unwrap();

        assert!(result.summary.contains("At last, a chronicle."));
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_terminal() {
        let history = HistoryBuilder::new().locations(3).build();
        let range = range_for(&history);
        let model = MockModel::failing("service unavailable");
        let retry = RetryPolicy::immediate(3);

        let err = ChronicleSynthesizer::new(&model, &retry)
            .synthesize(Uuid::new_v4(), &range, &history, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::Exhausted { attempts: 3, .. }));
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let history = HistoryBuilder::new().locations(3).build();
        let range = range_for(&history);
        let model = Unauthorized::default();
        let retry = RetryPolicy::immediate(3);

        let err = ChronicleSynthesizer::new(&model, &retry)
            .synthesize(Uuid::new_v4(), &range, &history, &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SynthesisError::Exhausted {
                attempts: 1,
                source: LlmError::Api(chat::Error::Api { status: 401, .. })
            }
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let history = HistoryBuilder::new().locations(3).build();
        let mut range = range_for(&history);
        range.end = history.len();
        let model = MockModel::new(vec![]);
        let retry = RetryPolicy::immediate(1);

        let err = ChronicleSynthesizer::new(&model, &retry)
            .synthesize(Uuid::new_v4(), &range, &history, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidRange { .. }));
        assert_eq!(model.call_count(), 0);
    }
}
