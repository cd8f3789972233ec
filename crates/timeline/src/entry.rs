//! Timed entries, segments, and retimed entries.
//!
//! All times are seconds. Entries are immutable once parsed; derived values
//! (segments, retimed entries) are created per run and dropped with it.

use serde::{Deserialize, Serialize};

use autocut_common::clock::{micros_to_secs, secs_to_micros};

/// One subtitle cue as read from the source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEntry {
    /// 1-based position in the source file.
    pub index: usize,

    /// Start time (seconds).
    pub start: f64,

    /// End time (seconds), never before `start`.
    pub end: f64,

    /// Cue text, possibly spanning several lines.
    pub text: String,
}

impl TimedEntry {
    pub fn new(index: usize, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Text with surrounding whitespace removed, as compared against rejections.
    pub fn normalized_text(&self) -> &str {
        self.text.trim()
    }

    /// The time range this entry covers.
    pub fn segment(&self) -> Segment {
        Segment::new(self.start, self.end)
    }

    pub fn start_micros(&self) -> i64 {
        secs_to_micros(self.start)
    }

    pub fn end_micros(&self) -> i64 {
        secs_to_micros(self.end)
    }
}

/// A time range of source material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    /// Build a segment; an `end` before `start` collapses to zero length.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `other` lies entirely within this segment.
    pub fn contains(&self, other: &Segment) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Extend the end so the segment lasts at least `min_secs`.
    pub fn widened_to(self, min_secs: f64) -> Self {
        if self.duration() >= min_secs {
            self
        } else {
            Self {
                start: self.start,
                end: self.start + min_secs,
            }
        }
    }
}

/// An entry that survived selection, with its position on the new timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedEntry {
    pub original: TimedEntry,
    pub adjusted_start: f64,
    pub adjusted_end: f64,
}

impl RetainedEntry {
    /// Place `original` on the new timeline at `cursor_micros`.
    ///
    /// Returns the entry and the cursor for the next one.
    pub fn place(original: TimedEntry, cursor_micros: i64) -> (Self, i64) {
        let length = (original.end_micros() - original.start_micros()).max(0);
        let next = cursor_micros + length;
        let entry = Self {
            original,
            adjusted_start: micros_to_secs(cursor_micros),
            adjusted_end: micros_to_secs(next),
        };
        (entry, next)
    }

    pub fn adjusted_start_micros(&self) -> i64 {
        secs_to_micros(self.adjusted_start)
    }

    pub fn adjusted_end_micros(&self) -> i64 {
        secs_to_micros(self.adjusted_end)
    }

    pub fn duration(&self) -> f64 {
        self.adjusted_end - self.adjusted_start
    }

    /// Source range to extract for this entry.
    pub fn source_segment(&self) -> Segment {
        self.original.segment()
    }
}

/// Parsed subtitle timeline. Read-only after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<TimedEntry>,
}

impl Timeline {
    pub fn new(entries: Vec<TimedEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TimedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End time of the last entry, or zero when empty.
    pub fn duration(&self) -> f64 {
        self.entries.iter().map(|e| e.end).fold(0.0, f64::max)
    }
}
