//! Heuristic event tagging.
//!
//! Six independent keyword scorers look for combat, NPC interaction,
//! inventory changes, character-state changes, discoveries and plot beats.
//! Tagging is best effort: the events only feed the synthesis prompt and are
//! never persisted.

use crate::message::{Message, MessageKind, Role};
use crate::scanner::{extract_location_name, parse_transition};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest event description kept, in characters.
const MAX_DESCRIPTION_CHARS: usize = 160;

/// Most matched keywords kept per event.
const MAX_DETAILS: usize = 6;

/// Category of a tagged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Combat,
    NpcInteraction,
    Inventory,
    CharacterState,
    Discovery,
    Plot,
}

impl EventType {
    /// All categories, in prompt order.
    pub const ALL: [EventType; 6] = [
        EventType::Combat,
        EventType::NpcInteraction,
        EventType::Inventory,
        EventType::CharacterState,
        EventType::Discovery,
        EventType::Plot,
    ];

    /// Minimum keyword hits before a message counts as this kind of event.
    pub fn min_hits(&self) -> usize {
        match self {
            EventType::CharacterState => 1,
            _ => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventType::Combat => "Combat",
            EventType::NpcInteraction => "NPC interactions",
            EventType::Inventory => "Items and treasure",
            EventType::CharacterState => "Character changes",
            EventType::Discovery => "Discoveries",
            EventType::Plot => "Plot developments",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How much an event matters to the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Important,
    Critical,
}

/// An event tagged in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub event_type: EventType,
    pub location: String,
    pub description: String,
    /// Keywords that triggered the tag, in order of first appearance.
    pub details: Vec<String>,
    pub importance: Importance,
}

struct Scorer {
    event_type: EventType,
    patterns: Vec<Regex>,
    escalation: Regex,
}

impl Scorer {
    fn new(event_type: EventType, patterns: &[&str], escalation: &str) -> Self {
        Self {
            event_type,
            patterns: patterns.iter().map(|p| compile(p)).collect(),
            escalation: compile(escalation),
        }
    }

    /// Hit count and matched keywords for lowercase `text`.
    fn score(&self, text: &str) -> (usize, Vec<String>) {
        let mut hits = 0;
        let mut details: Vec<String> = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.find_iter(text) {
                hits += 1;
                let keyword = m.as_str().to_string();
                if details.len() < MAX_DETAILS && !details.contains(&keyword) {
                    details.push(keyword);
                }
            }
        }

        (hits, details)
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid event pattern {pattern:?}: {e}"))
}

lazy_static::lazy_static! {
    static ref SCORERS: Vec<Scorer> = vec![
        Scorer::new(
            EventType::Combat,
            &[
                r"\b(attack|attacks|attacked|attacking)\b",
                r"\b(hit|hits|strike|strikes|struck|slash|slashes|stab|stabs)\b",
                r"\b(damage|wound|wounded|wounds)\b",
                r"\b(initiative|combat|battle|fight|fought)\b",
                r"\b(kill|killed|slay|slain|defeat|defeated)\b",
                r"\b(goblin|orc|skeleton|zombie|bandit|wolf|troll|ghoul|cultist|dragon)s?\b",
                r"\b\d+\s*(hp|hit points?)\b",
            ],
            r"\b(death|dies|died|defeated|slain|killed|critical hit)\b",
        ),
        Scorer::new(
            EventType::NpcInteraction,
            &[
                r"\b(says|said|asks|asked|replies|replied|tells|told|whispers|whispered)\b",
                r"\b(merchant|innkeeper|guard|captain|priest|elder|mayor|blacksmith|scholar|noble)s?\b",
                r"\b(persuade|persuaded|persuasion|intimidate|intimidated|deception|negotiate|negotiated)\b",
                r"\b(agree|agrees|agreed|refuse|refuses|refused|promise|promised)\b",
            ],
            r"\b(alliance|allied|betray|betrayed|betrays|sworn|oath)\b",
        ),
        Scorer::new(
            EventType::Inventory,
            &[
                r"\b(gold|silver|copper)( pieces?| coins?)?\b",
                r"\b\d+\s*(gp|sp|cp)\b",
                r"\b(found|obtained|acquired|received|bought|sold|looted|picked up)\b",
                r"\b(potion|scroll|sword|shield|armor|ring|amulet|key|map|dagger|staff)s?\b",
                r"\b(inventory|treasure|loot|reward)\b",
            ],
            r"\b(legendary|artifact|magic item|magical|enchanted)\b",
        ),
        Scorer::new(
            EventType::CharacterState,
            &[
                r"\b(level up|leveled up|levelled up|reaches level|gained a level)\b",
                r"\b(experience points|\d+\s*xp)\b",
                r"\b(unconscious|poisoned|paralyzed|frightened|exhausted|exhaustion|cursed|stunned)\b",
                r"\b(long rest|short rest|healed|restored)\b",
                r"\b(died|dead|dying|death saving throws?)\b",
            ],
            r"\b(level up|leveled up|died|dead|dying|unconscious|cursed)\b",
        ),
        Scorer::new(
            EventType::Discovery,
            &[
                r"\b(discover|discovers|discovered|uncover|uncovers|uncovered)\b",
                r"\b(hidden|secret|concealed|ancient|forgotten)\b",
                r"\b(passage|door|chamber|ruin|ruins|tomb|vault|inscription|mural|tunnel)s?\b",
                r"\b(notice|notices|noticed|spot|spots|spotted|reveal|reveals|revealed)\b",
            ],
            r"\b(artifact|legendary|secret)\b",
        ),
        Scorer::new(
            EventType::Plot,
            &[
                r"\b(quest|quests|mission|task|objective)\b",
                r"\b(prophecy|destiny|fate|ritual|conspiracy|cult)\b",
                r"\b(learned|learns|realize|realizes|realized|truth|reveal|revealed)\b",
                r"\b(complete|completed|accept|accepted|fail|failed)\b",
            ],
            r"\b(quest complete|completed the quest|betray|betrayed|revealed|prophecy)\b",
        ),
    ];
}

/// Tag events in `messages`, which start at `start_location`.
///
/// The current location follows the messages: a summary names the location
/// it closes, and a transition moves to its destination.
pub fn extract_events(messages: &[Message], start_location: &str) -> Vec<GameEvent> {
    let mut location = start_location.to_string();
    let mut events = Vec::new();

    for message in messages {
        if message.role == Role::System {
            continue;
        }

        match message.kind() {
            MessageKind::LocationSummary => {
                location = extract_location_name(&message.content);
            }
            MessageKind::LocationTransition => {
                if let Some((_, to)) = parse_transition(&message.content) {
                    location = to;
                }
                continue;
            }
            MessageKind::Chronicle | MessageKind::Narration => {}
        }

        events.extend(tag_message(&message.content, &location));
    }

    events
}

/// Tag one message's text.
pub fn tag_message(content: &str, location: &str) -> Vec<GameEvent> {
    let text = content.to_lowercase();
    let mut events = Vec::new();

    for scorer in SCORERS.iter() {
        let (hits, details) = scorer.score(&text);
        if hits < scorer.event_type.min_hits() {
            continue;
        }

        let importance = if scorer.escalation.is_match(&text) {
            Importance::Critical
        } else {
            Importance::Important
        };

        events.push(GameEvent {
            event_type: scorer.event_type,
            location: location.to_string(),
            description: describe(content),
            details,
            importance,
        });
    }

    events
}

/// First sentence of `content`, truncated on a character boundary.
fn describe(content: &str) -> String {
    let body = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("==="))
        .collect::<Vec<_>>()
        .join(" ");

    let sentence = match body.find(['.', '!', '?']) {
        Some(end) => &body[..=end],
        None => body.as_str(),
    };

    if sentence.chars().count() > MAX_DESCRIPTION_CHARS {
        let truncated: String = sentence.chars().take(MAX_DESCRIPTION_CHARS).collect();
        format!("{}...", truncated.trim_end())
    } else {
        sentence.to_string()
    }
}

/// Render events as a compact prompt block, at most `per_category` per category.
///
/// Critical events are listed before important ones within a category.
pub fn format_events(events: &[GameEvent], per_category: usize) -> String {
    let mut out = String::new();

    for event_type in EventType::ALL {
        let mut matching: Vec<&GameEvent> =
            events.iter().filter(|e| e.event_type == event_type).collect();
        if matching.is_empty() {
            continue;
        }
        // Stable: keeps chronological order within each importance level
        matching.sort_by(|a, b| b.importance.cmp(&a.importance));

        out.push_str(&format!("{}:\n", event_type.label()));
        for event in matching.into_iter().take(per_category) {
            let marker = match event.importance {
                Importance::Critical => "!",
                Importance::Important => "-",
            };
            out.push_str(&format!("{marker} [{}] {}\n", event.location, event.description));
        }
        out.push('\n');
    }

    if out.is_empty() {
        out.push_str("No notable events detected.\n");
    }

    out
}
