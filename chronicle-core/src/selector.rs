//! Selection of the next block of history to compress.
//!
//! The oldest `chunk_size` plain summaries after the most recent chronicle are
//! folded together once `compression_trigger` of them have accumulated and
//! there are enough to fill a whole chunk.

use crate::config::CompressionConfig;
use crate::scanner::{MarkerScan, SummaryMarker};

/// A contiguous, inclusive range of messages to replace with one chronicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRange {
    pub start: usize,
    pub end: usize,
    /// The plain summaries inside the range, oldest first.
    pub summaries: Vec<SummaryMarker>,
    /// The chronicle that bounds the range from below, if any.
    pub preceding_chronicle: Option<usize>,
}

impl CompressionRange {
    /// Number of messages covered.
    pub fn message_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn start_location(&self) -> &str {
        self.summaries.first().map(|s| s.location.as_str()).unwrap_or_default()
    }

    pub fn end_location(&self) -> &str {
        self.summaries.last().map(|s| s.location.as_str()).unwrap_or_default()
    }

    /// Locations strictly between the first and last summary.
    pub fn intermediate_locations(&self) -> Vec<&str> {
        if self.summaries.len() < 3 {
            return Vec::new();
        }
        self.summaries[1..self.summaries.len() - 1]
            .iter()
            .map(|s| s.location.as_str())
            .collect()
    }

    /// Every location covered, in order.
    pub fn locations(&self) -> Vec<&str> {
        self.summaries.iter().map(|s| s.location.as_str()).collect()
    }
}

/// Outcome of range selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Not enough pending summaries yet.
    NotNeeded { pending: usize, trigger: usize },
    Selected(CompressionRange),
}

impl Selection {
    pub fn range(&self) -> Option<&CompressionRange> {
        match self {
            Selection::Selected(range) => Some(range),
            Selection::NotNeeded { .. } => None,
        }
    }
}

/// Pick the block of history to compress next.
pub fn select_range(scan: &MarkerScan, config: &CompressionConfig) -> Selection {
    let pending = scan.summaries_after_chronicle();
    let chunk_size = config.chunk_size.max(1);
    let trigger = config.compression_trigger;

    if pending.len() < trigger || pending.len() < chunk_size {
        return Selection::NotNeeded {
            pending: pending.len(),
            trigger,
        };
    }

    let targets: Vec<SummaryMarker> = pending.into_iter().take(chunk_size).cloned().collect();
    let preceding_chronicle = scan.last_chronicle();
    let base = preceding_chronicle.map_or(0, |c| c + 1);
    let first = targets[0].index;
    let end = targets[targets.len() - 1].index;

    // A transition between the lower bound and the first target anchors the
    // segment; it stays outside the replaced block.
    let start = scan
        .transitions
        .iter()
        .copied()
        .rev()
        .find(|&t| t >= base && t < first)
        .map_or(base, |t| t + 1);

    Selection::Selected(CompressionRange {
        start,
        end,
        summaries: targets,
        preceding_chronicle,
    })
}
