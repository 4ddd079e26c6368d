//! The "adventure so far" digest.
//!
//! Collects every chronicle and every plain location summary in history order
//! and renders them as one readable recap. Works on the text alone.

use crate::message::{Message, MessageKind, CHRONICLE_MARKER, LOCATION_SUMMARY_MARKER};
use crate::scanner::{extract_location_name, parse_transition};
use serde::Serialize;

/// One entry of the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DigestEntry {
    Chronicle { index: usize, text: String },
    Summary { index: usize, location: String, text: String },
}

impl DigestEntry {
    pub fn index(&self) -> usize {
        match self {
            DigestEntry::Chronicle { index, .. } | DigestEntry::Summary { index, .. } => *index,
        }
    }
}

/// Chronicles and summaries in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub entries: Vec<DigestEntry>,
    /// Destination of the most recent transition.
    pub current_location: Option<String>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chronicle_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, DigestEntry::Chronicle { .. }))
            .count()
    }

    /// Render the digest as plain text.
    pub fn render(&self) -> String {
        let mut out = String::from("THE ADVENTURE SO FAR\n");

        if self.entries.is_empty() {
            out.push_str("\nNothing has been recorded yet.\n");
        }

        let mut part = 0;
        for entry in &self.entries {
            match entry {
                DigestEntry::Chronicle { text, .. } => {
                    part += 1;
                    out.push_str(&format!("\nChronicle, part {part}\n{text}\n"));
                }
                DigestEntry::Summary { location, text, .. } => {
                    out.push_str(&format!("\n{location}\n{text}\n"));
                }
            }
        }

        if let Some(location) = &self.current_location {
            out.push_str(&format!("\nThe party is now at {location}.\n"));
        }
        out
    }
}

/// Build the digest of `messages`.
pub fn build_digest(messages: &[Message]) -> Digest {
    let mut digest = Digest::default();

    for (index, message) in messages.iter().enumerate() {
        match message.kind() {
            MessageKind::Chronicle => digest.entries.push(DigestEntry::Chronicle {
                index,
                text: chronicle_text(&message.content),
            }),
            MessageKind::LocationSummary => {
                let location = extract_location_name(&message.content);
                let text = summary_text(&message.content, &location);
                digest
                    .entries
                    .push(DigestEntry::Summary { index, location, text });
            }
            MessageKind::LocationTransition => {
                if let Some((_, to)) = parse_transition(&message.content) {
                    digest.current_location = Some(to);
                }
            }
            MessageKind::Narration => {}
        }
    }

    digest
}

fn chronicle_text(content: &str) -> String {
    content
        .replace(LOCATION_SUMMARY_MARKER, "")
        .replace(CHRONICLE_MARKER, "")
        .trim()
        .to_string()
}

fn summary_text(content: &str, location: &str) -> String {
    let body = content.replace(LOCATION_SUMMARY_MARKER, "");
    let body = body.trim();
    body.strip_prefix(location)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_chronological() {
        let messages = vec![
            Message::system("rules"),
            Message::chronicle("The party left the city."),
            Message::transition("City", "Forest"),
            Message::user("I climb a tree"),
            Message::location_summary("Forest", "Found an owlbear nest."),
            Message::transition("Forest", "Ruins"),
        ];

        let digest = build_digest(&messages);

        assert_eq!(
            digest.entries,
            vec![
                DigestEntry::Chronicle { index: 1, text: "The party left the city.".into() },
                DigestEntry::Summary {
                    index: 4,
                    location: "Forest".into(),
                    text: "Found an owlbear nest.".into()
                },
            ]
        );
        assert_eq!(digest.chronicle_count(), 1);
        assert_eq!(digest.current_location.as_deref(), Some("Ruins"));
    }

    #[test]
    fn test_render() {
        let messages = vec![
            Message::chronicle("Long ago."),
            Message::location_summary("Forest", "Owlbears."),
        ];
        let text = build_digest(&messages).render();

        assert!(text.starts_with("THE ADVENTURE SO FAR"));
        assert!(text.contains("Chronicle, part 1\nLong ago."));
        assert!(text.contains("Forest\nOwlbears."));
        assert!(!text.contains(CHRONICLE_MARKER));
    }

    #[test]
    fn test_empty_history() {
        let digest = build_digest(&[Message::user("hi")]);
        assert!(digest.is_empty());
        assert!(digest.render().contains("Nothing has been recorded yet."));
    }
}
