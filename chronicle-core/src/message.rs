//! Conversation history messages.
//!
//! The history file is a JSON array of `{role, content}` objects. Older files
//! mark summaries, chronicles and transitions only through literal strings in
//! the content; messages written by this crate additionally carry an explicit
//! `kind` tag, which wins over content sniffing whenever it is present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Header line that opens every location summary (plain or chronicle).
pub const LOCATION_SUMMARY_MARKER: &str = "=== LOCATION SUMMARY ===";

/// Trailer that distinguishes a compressed chronicle from a plain summary.
pub const CHRONICLE_MARKER: &str = "[AI-Generated Chronicle Summary]";

/// Prefix of the user message recorded when the party changes location.
pub const TRANSITION_MARKER: &str = "Location transition:";

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// What a message means to the compression pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ordinary narration or player input.
    Narration,
    /// A recap of a single location.
    LocationSummary,
    /// A recap spanning several location summaries.
    Chronicle,
    /// Boundary recorded when the party moves between locations.
    LocationTransition,
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Explicit marker tag. Absent on legacy messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,

    /// Any other keys found on the message, kept so a rewrite does not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// JSON text this message was loaded from.
    #[serde(skip)]
    source: Option<Arc<str>>,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role
            && self.content == other.content
            && self.kind == other.kind
            && self.extra == other.extra
    }
}

impl Message {
    fn new(role: Role, content: impl Into<String>, kind: Option<MessageKind>) -> Self {
        Self {
            role,
            content: content.into(),
            kind,
            extra: Map::new(),
            source: None,
        }
    }

    /// Parse one message, remembering its exact source text.
    pub fn from_source(json: &str) -> serde_json::Result<Self> {
        let mut message: Message = serde_json::from_str(json)?;
        message.source = Some(Arc::from(json));
        Ok(message)
    }

    /// The source text, if the message still decodes to exactly this value.
    pub fn unchanged_source(&self) -> Option<&str> {
        let source = self.source.as_deref()?;
        let reparsed: Message = serde_json::from_str(source).ok()?;
        (reparsed == *self).then_some(source)
    }

    /// Create a message with an explicit kind tag.
    pub fn tagged(role: Role, content: impl Into<String>, kind: MessageKind) -> Self {
        Self::new(role, content, Some(kind))
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, None)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, None)
    }

    /// Create a plain location summary for `location`.
    ///
    /// The body's first line is `<location>: ...` so that legacy readers
    /// recover the location name from the text alone.
    pub fn location_summary(location: &str, recap: &str) -> Self {
        let content = format!(
            "{LOCATION_SUMMARY_MARKER}\n\n{location}: {}",
            recap.trim()
        );
        Self::new(Role::Assistant, content, Some(MessageKind::LocationSummary))
    }

    /// Create a chronicle message from synthesized prose.
    pub fn chronicle(prose: &str) -> Self {
        Self::new(
            Role::Assistant,
            chronicle_content(prose),
            Some(MessageKind::Chronicle),
        )
    }

    /// Create the transition message recorded when moving from `from` to `to`.
    pub fn transition(from: &str, to: &str) -> Self {
        Self::new(
            Role::User,
            format!("{TRANSITION_MARKER} {from} to {to}"),
            Some(MessageKind::LocationTransition),
        )
    }

    /// Classify this message.
    pub fn kind(&self) -> MessageKind {
        if let Some(kind) = self.kind {
            return kind;
        }

        if self.content.contains(CHRONICLE_MARKER) {
            MessageKind::Chronicle
        } else if self.content.contains(LOCATION_SUMMARY_MARKER) {
            MessageKind::LocationSummary
        } else if self.role == Role::User && self.content.contains(TRANSITION_MARKER) {
            MessageKind::LocationTransition
        } else {
            MessageKind::Narration
        }
    }

    pub fn is_transition(&self) -> bool {
        self.kind() == MessageKind::LocationTransition
    }

    pub fn is_chronicle(&self) -> bool {
        self.kind() == MessageKind::Chronicle
    }

    pub fn is_plain_summary(&self) -> bool {
        self.kind() == MessageKind::LocationSummary
    }
}

/// Wrap prose in the summary header and chronicle trailer.
pub fn chronicle_content(prose: &str) -> String {
    format!(
        "{LOCATION_SUMMARY_MARKER}\n\n{}\n\n{CHRONICLE_MARKER}",
        prose.trim()
    )
}
