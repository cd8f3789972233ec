//! Timeline renumbering: lay retained entries end to end from zero.
//!
//! Each entry keeps its exact duration, and each starts where the previous
//! one ended. Arithmetic is on integer microseconds so the boundaries of
//! consecutive entries are bit-identical.

use autocut_timeline::{RetainedEntry, TimedEntry};

/// Place `entries` (in the given order) on a contiguous zero-based timeline.
pub fn renumber(entries: &[TimedEntry]) -> Vec<RetainedEntry> {
    let mut cursor = 0i64;
    let retimed: Vec<RetainedEntry> = entries
        .iter()
        .cloned()
        .map(|entry| {
            let (retained, next) = RetainedEntry::place(entry, cursor);
            cursor = next;
            retained
        })
        .collect();

    tracing::debug!(
        entries = retimed.len(),
        total_secs = total_duration(&retimed),
        "Renumbered timeline"
    );
    retimed
}

/// End of the last retimed entry.
pub fn total_duration(entries: &[RetainedEntry]) -> f64 {
    entries.last().map(|e| e.adjusted_end).unwrap_or(0.0)
}
