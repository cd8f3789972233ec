//! Segment selection: window the timeline and drop rejected cues.

use serde::{Deserialize, Serialize};

use autocut_common::error::{AutocutError, AutocutResult};
use autocut_timeline::{RejectionSet, TimedEntry};

/// Inclusive 1-based window of entry indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionWindow {
    pub start_index: usize,
    pub end_index: usize,
}

impl SelectionWindow {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
        }
    }

    /// Window covering every entry of a timeline with `total` entries.
    pub fn full(total: usize) -> Self {
        Self::new(1, total)
    }

    /// Check the window against a timeline of `total` entries.
    pub fn validate(&self, total: usize) -> AutocutResult<()> {
        if self.start_index < 1 || self.end_index < self.start_index || self.end_index > total {
            return Err(AutocutError::Range {
                start: self.start_index,
                end: self.end_index,
                total,
            });
        }
        Ok(())
    }
}

/// Result of a selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Surviving entries in original order.
    pub retained: Vec<TimedEntry>,

    /// Entries inside the window.
    pub considered: usize,

    /// Start of the first windowed entry.
    pub clip_start: f64,

    /// End of the last windowed entry.
    pub clip_end: f64,
}

impl Selection {
    pub fn rejected(&self) -> usize {
        self.considered - self.retained.len()
    }

    pub fn clip_duration(&self) -> f64 {
        (self.clip_end - self.clip_start).max(0.0)
    }
}

/// Keep entries inside `window` whose trimmed text is not rejected.
pub fn select(
    entries: &[TimedEntry],
    window: SelectionWindow,
    rejections: &RejectionSet,
) -> AutocutResult<Selection> {
    window.validate(entries.len())?;

    let windowed = &entries[window.start_index - 1..window.end_index];
    let retained: Vec<TimedEntry> = windowed
        .iter()
        .filter(|entry| !rejections.contains(&entry.text))
        .cloned()
        .collect();

    let selection = Selection {
        considered: windowed.len(),
        clip_start: windowed[0].start,
        clip_end: windowed[windowed.len() - 1].end,
        retained,
    };

    tracing::info!(
        considered = selection.considered,
        retained = selection.retained.len(),
        rejected = selection.rejected(),
        "Selected subtitle entries"
    );

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Vec<TimedEntry> {
        vec![
            TimedEntry::new(1, 0.0, 1.0, "ok"),
            TimedEntry::new(2, 1.0, 2.5, "hello"),
            TimedEntry::new(3, 2.5, 4.0, "ok"),
        ]
    }

    #[test]
    fn test_rejects_filler() {
        let rejections = RejectionSet::from_lines(["ok"]);
        let selection = select(&sample(), SelectionWindow::new(1, 3), &rejections).unwrap();
        assert_eq!(selection.retained, vec![TimedEntry::new(2, 1.0, 2.5, "hello")]);
        assert_eq!(selection.considered, 3);
        assert_eq!(selection.rejected(), 2);
        assert_eq!(selection.clip_start, 0.0);
        assert_eq!(selection.clip_end, 4.0);
    }

    #[test]
    fn test_rejection_trims_cue_text() {
        let entries = vec![TimedEntry::new(1, 0.0, 1.0, "  ok \n")];
        let rejections = RejectionSet::from_lines(["ok"]);
        let selection = select(&entries, SelectionWindow::full(1), &rejections).unwrap();
        assert!(selection.retained.is_empty());
    }

    #[test]
    fn test_window_bounds() {
        let rejections = RejectionSet::new();
        let single = select(&sample(), SelectionWindow::new(1, 1), &rejections).unwrap();
        assert_eq!(single.retained.len(), 1);
        assert_eq!(single.clip_end, 1.0);

        let middle = select(&sample(), SelectionWindow::new(2, 3), &rejections).unwrap();
        assert_eq!(middle.retained[0].index, 2);
        assert_eq!(middle.clip_start, 1.0);
    }

    #[test]
    fn test_invalid_windows() {
        let rejections = RejectionSet::new();
        for (start, end) in [(0, 2), (3, 2), (1, 4)] {
            let err = select(&sample(), SelectionWindow::new(start, end), &rejections).unwrap_err();
            assert!(matches!(err, AutocutError::Range { total: 3, .. }));
        }
        assert!(select(&[], SelectionWindow::new(1, 1), &rejections).is_err());
    }

    proptest! {
        #[test]
        fn prop_range_error_iff_window_invalid(
            total in 0usize..20,
            start in 0usize..25,
            end in 0usize..25,
        ) {
            let entries: Vec<TimedEntry> = (0..total)
                .map(|i| TimedEntry::new(i + 1, i as f64, i as f64 + 1.0, format!("cue {i}")))
                .collect();
            let result = select(&entries, SelectionWindow::new(start, end), &RejectionSet::new());
            let invalid = start < 1 || end < start || end > total;
            prop_assert_eq!(result.is_err(), invalid);
            if let Ok(selection) = result {
                prop_assert_eq!(selection.retained.len(), end - start + 1);
            }
        }

        #[test]
        fn prop_retained_count_matches_non_rejected(
            texts in proptest::collection::vec(prop_oneof![Just("ok"), Just("keep"), Just(" ok ")], 1..30),
        ) {
            let entries: Vec<TimedEntry> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| TimedEntry::new(i + 1, i as f64, i as f64 + 0.5, *t))
                .collect();
            let rejections = RejectionSet::from_lines(["ok"]);
            let selection = select(&entries, SelectionWindow::full(entries.len()), &rejections).unwrap();
            let expected = texts.iter().filter(|t| t.trim() != "ok").count();
            prop_assert_eq!(selection.retained.len(), expected);
            prop_assert!(selection.retained.windows(2).all(|w| w[0].index < w[1].index));
        }
    }
}
