//! Per-location summaries.
//!
//! When the party leaves a location, the conversation since the previous
//! boundary is recapped into a plain location summary, followed by the
//! transition message. These summaries are what chronicle compression later
//! folds together.

use super::prompts::{location_prompt, render_transcript, LOCATION_SYSTEM_PROMPT};
use super::synthesizer::SynthesisError;
use crate::llm::{ChatModel, LlmError};
use crate::message::{Message, MessageKind, Role};
use crate::retry::RetryPolicy;

/// What `record_transition` appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    /// Index of the new summary, if one was written.
    pub summary_index: Option<usize>,
    pub transition_index: usize,
}

/// Writes location summaries with a model and a retry policy.
pub struct LocationSummarizer<'a, M: ChatModel + ?Sized> {
    model: &'a M,
    retry: &'a RetryPolicy,
}

impl<'a, M: ChatModel + ?Sized> LocationSummarizer<'a, M> {
    pub fn new(model: &'a M, retry: &'a RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Recap `segment` as a plain summary for `location`.
    pub async fn summarize(
        &self,
        location: &str,
        segment: &[Message],
    ) -> Result<Message, SynthesisError> {
        let user = location_prompt(location, &render_transcript(segment));

        let recap = self
            .retry
            .run_while("location summary", LlmError::is_transient, |_| {
                let user = user.as_str();
                async move {
                    match self.model.complete(LOCATION_SYSTEM_PROMPT, user).await {
                        Ok(reply) if !reply.trim().is_empty() => Ok(reply),
                        Ok(_) => Err(LlmError::EmptyReply),
                        Err(e) => Err(e),
                    }
                }
            })
            .await
            .map_err(|(attempts, source)| SynthesisError::Exhausted { attempts, source })?;

        Ok(Message::location_summary(location, strip_location_prefix(&recap, location)))
    }

    /// Record leaving `from` for `to`.
    ///
    /// Appends a summary of the narration since the last boundary (if there
    /// is any) and then the transition message. On failure `messages` is left
    /// unchanged.
    pub async fn record_transition(
        &self,
        messages: &mut Vec<Message>,
        from: &str,
        to: &str,
    ) -> Result<TransitionRecord, SynthesisError> {
        let segment = segment_since_boundary(messages);

        let summary = if segment.is_empty() {
            tracing::debug!(%from, "no narration since last boundary, skipping summary");
            None
        } else {
            tracing::info!(%from, %to, messages = segment.len(), "summarizing location");
            Some(self.summarize(from, segment).await?)
        };

        let summary_index = summary.map(|s| {
            messages.push(s);
            messages.len() - 1
        });
        messages.push(Message::transition(from, to));

        Ok(TransitionRecord {
            summary_index,
            transition_index: messages.len() - 1,
        })
    }
}

/// Non-system messages after the most recent summary, chronicle or transition.
pub fn segment_since_boundary(messages: &[Message]) -> &[Message] {
    let start = messages
        .iter()
        .rposition(|m| m.kind() != MessageKind::Narration)
        .map_or(0, |i| i + 1);

    let segment = &messages[start..];
    let first_non_system = segment
        .iter()
        .position(|m| m.role != Role::System)
        .unwrap_or(segment.len());
    &segment[first_non_system..]
}

fn strip_location_prefix<'t>(recap: &'t str, location: &str) -> &'t str {
    let trimmed = recap.trim();
    trimmed
        .strip_prefix(location)
        .and_then(|rest| rest.trim_start().strip_prefix(':'))
        .map(str::trim_start)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{extract_location_name, scan};
    use crate::testing::MockModel;

    #[test]
    fn test_segment_since_boundary() {
        let messages = vec![
            Message::system("rules"),
            Message::user("look"),
            Message::location_summary("Gate", "quiet"),
            Message::transition("Gate", "Market"),
            Message::user("buy bread"),
            Message::assistant("The baker smiles."),
        ];
        let segment = segment_since_boundary(&messages);
        assert_eq!(segment.len(), 2);
        assert_eq!(segment[0].content, "buy bread");

        // Leading system prompt is not part of the first location
        let fresh = vec![Message::system("rules"), Message::user("hello")];
        assert_eq!(segment_since_boundary(&fresh).len(), 1);
    }

    #[test]
    fn test_strip_location_prefix() {
        assert_eq!(strip_location_prefix("Gate: calm night", "Gate"), "calm night");
        assert_eq!(strip_location_prefix("  calm night ", "Gate"), "calm night");
        assert_eq!(strip_location_prefix("Gateway opened", "Gate"), "Gateway opened");
    }

    #[tokio::test]
    async fn test_record_transition_appends_summary_then_transition() {
        let mut messages = vec![
            Message::system("rules"),
            Message::user("I talk to the innkeeper"),
            Message::assistant("She tells you about the crypt."),
        ];
        let model = MockModel::new(vec![Ok("Crossroads Inn: The party heard of a crypt.".into())]);
        let retry = RetryPolicy::immediate(3);

        let record = LocationSummarizer::new(&model, &retry)
            .record_transition(&mut messages, "Crossroads Inn", "Old Crypt")
            .await
            .unwrap();

        assert_eq!(record, TransitionRecord { summary_index: Some(3), transition_index: 4 });
        assert_eq!(messages.len(), 5);
        assert!(messages[3].is_plain_summary());
        assert_eq!(extract_location_name(&messages[3].content), "Crossroads Inn");
        assert!(messages[3].content.ends_with("Crossroads Inn: The party heard of a crypt."));
        assert!(messages[4].is_transition());

        let scan = scan(&messages);
        assert_eq!(scan.location_summaries.len(), 1);
        assert_eq!(scan.transitions, vec![4]);
    }

    #[tokio::test]
    async fn test_record_transition_without_narration() {
        let mut messages = vec![Message::transition("A", "B")];
        let model = MockModel::new(vec![]);
        let retry = RetryPolicy::immediate(1);

        let record = LocationSummarizer::new(&model, &retry)
            .record_transition(&mut messages, "B", "C")
            .await
            .unwrap();

        assert_eq!(record.summary_index, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_summary_leaves_history_untouched() {
        let mut messages = vec![Message::user("I search the room")];
        let before = messages.clone();
        let model = MockModel::failing("timeout");
        let retry = RetryPolicy::immediate(2);

        let err = LocationSummarizer::new(&model, &retry)
            .record_transition(&mut messages, "Study", "Hall")
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::Exhausted { attempts: 2, .. }));
        assert_eq!(messages, before);
    }
}
