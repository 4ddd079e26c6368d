//! Splicing a chronicle into the history.
//!
//! The selected range is replaced by one message; everything outside it is
//! moved over untouched. Transition messages at either edge of the range are
//! never absorbed: they anchor where the next uncompressed segment begins.

use crate::message::Message;
use thiserror::Error;

/// How far past the range to look for the transition that anchors the next segment.
pub const TRANSITION_LOOKAHEAD: usize = 3;

/// Errors from rewriting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("range {start}..={end} is empty once boundary transitions are kept")]
    EmptyRange { start: usize, end: usize },

    #[error("range end {end} is outside a history of {len} messages")]
    OutOfBounds { end: usize, len: usize },
}

/// A rewritten history.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub messages: Vec<Message>,
    /// Range actually replaced, after edge transitions were excluded. The
    /// chronicle sits at `start` in the new history.
    pub start: usize,
    pub end: usize,
    /// New index of the transition that follows the replaced range, if one
    /// lies within the lookahead window.
    pub preserved_transition: Option<usize>,
}

/// Replace `messages[start..=end]` with `replacement`.
///
/// Produces `messages[..start] + [replacement] + messages[end + 1..]`, except
/// that a transition sitting on the first or last index of the range is left
/// in place and the range shrinks around it.
pub fn rewrite(
    messages: Vec<Message>,
    start: usize,
    end: usize,
    replacement: Message,
) -> Result<Rewrite, RewriteError> {
    let len = messages.len();
    if end >= len {
        return Err(RewriteError::OutOfBounds { end, len });
    }

    let (mut start, mut end) = (start, end);
    while start <= end && messages[start].is_transition() {
        start += 1;
    }
    while end >= start && messages[end].is_transition() {
        if end == 0 {
            break;
        }
        end -= 1;
    }
    if start > end || messages[end].is_transition() {
        return Err(RewriteError::EmptyRange { start, end });
    }

    let preserved_transition = messages
        .iter()
        .enumerate()
        .skip(end + 1)
        .take(TRANSITION_LOOKAHEAD)
        .find(|(_, m)| m.is_transition())
        .map(|(i, _)| i - (end - start));

    let mut rest = messages;
    let tail = rest.split_off(end + 1);
    rest.truncate(start);
    rest.push(replacement);
    rest.extend(tail);

    Ok(Rewrite {
        messages: rest,
        start,
        end,
        preserved_transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HistoryBuilder;

    fn numbered(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::assistant(format!("m{i}"))).collect()
    }

    #[test]
    fn test_splice_correctness() {
        let input = numbered(10);
        let out = rewrite(input.clone(), 2, 5, Message::chronicle("saga")).unwrap();

        assert_eq!(out.messages.len(), 10 - (5 - 2));
        assert_eq!(&out.messages[..2], &input[..2]);
        assert!(out.messages[2].is_chronicle());
        assert_eq!(&out.messages[3..], &input[6..]);
        assert_eq!(out.preserved_transition, None);
    }

    #[test]
    fn test_following_transition_is_preserved() {
        // Summaries at 3, 7, ..., 31 and a transition at 32
        let input = HistoryBuilder::new().locations(8).build();
        let transition = input[32].clone();
        assert!(transition.is_transition());

        let out = rewrite(input.clone(), 0, 31, Message::chronicle("saga")).unwrap();

        assert_eq!(out.messages.len(), input.len() - 31);
        assert!(out.messages[0].is_chronicle());
        assert_eq!(out.preserved_transition, Some(1));
        assert_eq!(out.messages[1], transition);
    }

    #[test]
    fn test_edge_transitions_are_not_absorbed() {
        let mut input = numbered(6);
        input[1] = Message::transition("A", "B");
        input[4] = Message::transition("B", "C");

        let out = rewrite(input.clone(), 1, 4, Message::chronicle("saga")).unwrap();

        assert_eq!((out.start, out.end), (2, 3));
        assert_eq!(out.messages[1], input[1]);
        assert!(out.messages[2].is_chronicle());
        assert_eq!(out.messages[3], input[4]);
        assert_eq!(out.preserved_transition, Some(3));
    }

    #[test]
    fn test_range_of_only_transitions_is_empty() {
        let mut input = numbered(3);
        input[1] = Message::transition("A", "B");
        let err = rewrite(input, 1, 1, Message::chronicle("saga")).unwrap_err();
        assert!(matches!(err, RewriteError::EmptyRange { .. }));
    }

    #[test]
    fn test_out_of_bounds() {
        let err = rewrite(numbered(3), 0, 3, Message::chronicle("saga")).unwrap_err();
        assert_eq!(err, RewriteError::OutOfBounds { end: 3, len: 3 });
    }
}
