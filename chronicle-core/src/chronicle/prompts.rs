//! Prompt text for chronicle and location summaries.

use crate::message::{Message, MessageKind, Role};

pub const CHRONICLE_SYSTEM_PROMPT: &str = "You are the chronicler of a long-running tabletop \
adventure. You condense several location recaps into a single chronicle entry that reads like a \
passage from an epic. Write in past tense and third person. Keep names of people, places and items \
exactly as given. Never invent events that are not in the source material.";

pub const LOCATION_SYSTEM_PROMPT: &str = "You are the scribe of a tabletop adventure. You recap \
what the party did at one location in a few sentences of plain prose: who they met, what they \
fought, what they found and what changed. Write in past tense. Do not add headings or lists.";

/// User prompt asking for one chronicle paragraph covering `locations` in order.
pub fn chronicle_prompt(locations: &[&str], events_block: &str, transcript: &str) -> String {
    let route = locations.join(" -> ");
    let numbered = locations
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{}. {l}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Write ONE immersive paragraph chronicling the party's journey along this route:
{route}

Every one of these locations must be named, in this order:
{numbered}

## Key events
{events_block}
## Source material
{transcript}
## Instructions
- One paragraph of prose, no headings, no bullet points.
- Mention every location above in the order given.
- Keep the critical events (marked with !) and the consequences that still matter.
- Reply with the paragraph only."#
    )
}

/// User prompt asking for a recap of one location.
pub fn location_prompt(location: &str, transcript: &str) -> String {
    format!(
        r#"The party is leaving {location}. Recap what happened there.

## Conversation at {location}
{transcript}
Reply with the recap only, two to five sentences."#
    )
}

/// Render messages as a readable transcript, skipping system prompts.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let speaker = match (message.role, message.kind()) {
            (Role::System, _) => continue,
            (_, MessageKind::LocationSummary) | (_, MessageKind::Chronicle) => "Recap",
            (_, MessageKind::LocationTransition) => "Travel",
            (Role::User, _) => "Player",
            (Role::Assistant, _) => "Dungeon Master",
        };
        out.push_str(speaker);
        out.push_str(": ");
        out.push_str(message.content.trim());
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chronicle_prompt_lists_locations_in_order() {
        let prompt = chronicle_prompt(&["Gate", "Market", "Docks"], "Combat:\n", "Player: hi\n");
        assert!(prompt.contains("Gate -> Market -> Docks"));
        assert!(prompt.contains("1. Gate\n2. Market\n3. Docks"));
        assert!(prompt.contains("Player: hi"));
    }

    #[test]
    fn test_transcript_skips_system() {
        let transcript = render_transcript(&[
            Message::system("secret rules"),
            Message::user("I wave"),
            Message::assistant("The guard waves back."),
            Message::transition("Gate", "Market"),
        ]);
        assert!(!transcript.contains("secret rules"));
        assert!(transcript.starts_with("Player: I wave\n\nDungeon Master: The guard waves back."));
        assert!(transcript.contains("Travel: Location transition: Gate to Market"));
    }
}
