//! Marker scanning over the conversation history.
//!
//! A single linear pass collects the indices of plain location summaries,
//! chronicles and location transitions.

use crate::message::{Message, MessageKind, TRANSITION_MARKER};

/// Location name used when a summary does not name one.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// A plain location summary found in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryMarker {
    pub index: usize,
    pub location: String,
}

/// Result of scanning a history for markers. All lists are in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub location_summaries: Vec<SummaryMarker>,
    pub ai_chronicles: Vec<usize>,
    pub transitions: Vec<usize>,
}

impl MarkerScan {
    /// Index of the most recent chronicle, if any.
    pub fn last_chronicle(&self) -> Option<usize> {
        self.ai_chronicles.last().copied()
    }

    /// Plain summaries that come after the most recent chronicle.
    pub fn summaries_after_chronicle(&self) -> Vec<&SummaryMarker> {
        let after = self.last_chronicle();
        self.location_summaries
            .iter()
            .filter(|s| after.is_none_or(|c| s.index > c))
            .collect()
    }
}

/// Scan `messages` for summary, chronicle and transition markers.
pub fn scan(messages: &[Message]) -> MarkerScan {
    let mut result = MarkerScan::default();

    for (index, message) in messages.iter().enumerate() {
        match message.kind() {
            MessageKind::LocationSummary => result.location_summaries.push(SummaryMarker {
                index,
                location: extract_location_name(&message.content),
            }),
            MessageKind::Chronicle => result.ai_chronicles.push(index),
            MessageKind::LocationTransition => result.transitions.push(index),
            MessageKind::Narration => {}
        }
    }

    result
}

/// Recover the location name from a summary's text.
///
/// The name is the text before the first `:` on the first non-empty line that
/// is not a `===` delimiter and contains a colon.
pub fn extract_location_name(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("==="))
        .find_map(|line| {
            let (name, _) = line.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

/// Parse `Location transition: <from> to <to>` (or `<from> -> <to>`).
pub fn parse_transition(content: &str) -> Option<(String, String)> {
    let start = content.find(TRANSITION_MARKER)? + TRANSITION_MARKER.len();
    let rest = content[start..].lines().next()?.trim();

    let (from, to) = rest.split_once(" -> ").or_else(|| rest.split_once(" to "))?;
    let (from, to) = (from.trim(), to.trim().trim_end_matches('.'));
    if from.is_empty() || to.is_empty() {
        return None;
    }
    Some((from.to_string(), to.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CHRONICLE_MARKER, LOCATION_SUMMARY_MARKER};

    fn summary(text: &str) -> Message {
        Message::assistant(format!("{LOCATION_SUMMARY_MARKER}\n\n{text}"))
    }

    #[test]
    fn test_scan_collects_markers() {
        let messages = vec![
            Message::system("You are the dungeon master."),
            Message::user("I open the door"),
            summary("Crypt Entrance: bones everywhere"),
            Message::user("Location transition: Crypt Entrance to Ossuary"),
            Message::assistant(format!("{LOCATION_SUMMARY_MARKER}\n\nOld tale\n\n{CHRONICLE_MARKER}")),
            summary("Ossuary: a ghoul fell"),
        ];

        let scan = scan(&messages);
        assert_eq!(
            scan.location_summaries,
            vec![
                SummaryMarker { index: 2, location: "Crypt Entrance".into() },
                SummaryMarker { index: 5, location: "Ossuary".into() },
            ]
        );
        assert_eq!(scan.ai_chronicles, vec![4]);
        assert_eq!(scan.transitions, vec![3]);
        assert_eq!(scan.last_chronicle(), Some(4));
        assert_eq!(scan.summaries_after_chronicle().len(), 1);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let messages = vec![summary("A: x"), Message::user("hi"), summary("B: y")];
        assert_eq!(scan(&messages), scan(&messages));
    }

    #[test]
    fn test_empty_history() {
        let scan = scan(&[]);
        assert!(scan.location_summaries.is_empty());
        assert!(scan.ai_chronicles.is_empty());
        assert!(scan.last_chronicle().is_none());
    }

    #[test]
    fn test_location_name_extraction() {
        assert_eq!(
            extract_location_name("=== LOCATION SUMMARY ===\n\n  Thornwood Keep : the gate held"),
            "Thornwood Keep"
        );
        assert_eq!(
            extract_location_name("=== LOCATION SUMMARY ===\nno colon here\nMarket: busy"),
            "Market"
        );
        assert_eq!(extract_location_name("=== LOCATION SUMMARY ==="), UNKNOWN_LOCATION);
        assert_eq!(extract_location_name(": leading colon"), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_parse_transition() {
        assert_eq!(
            parse_transition("Location transition: Gatehouse to Inner Keep"),
            Some(("Gatehouse".into(), "Inner Keep".into()))
        );
        assert_eq!(
            parse_transition("Location transition: A01 -> B02."),
            Some(("A01".into(), "B02".into()))
        );
        assert_eq!(parse_transition("Location transition: nowhere"), None);
        assert_eq!(parse_transition("no marker"), None);
    }
}
