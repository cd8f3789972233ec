//! Extraction planning: which source ranges the audio path copies.

use serde::{Deserialize, Serialize};

use autocut_timeline::{RetainedEntry, Segment};

use crate::merger::{merge_segments, widen_segments};

/// Granularity of audio extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExtractionMode {
    /// One range per retained cue; keeps audio in step with the subtitles.
    #[default]
    PerEntry,
    /// Ranges merged within a gap tolerance. Short pauses between
    /// neighbouring cues are kept, so the audio runs longer than the
    /// retimed subtitles.
    Merged { gap_threshold_secs: f64 },
}

/// Source ranges to extract, in output order.
pub fn plan_extraction(
    entries: &[RetainedEntry],
    mode: ExtractionMode,
    min_segment_secs: f64,
) -> Vec<Segment> {
    let segments: Vec<Segment> = entries.iter().map(RetainedEntry::source_segment).collect();
    let segments = match mode {
        ExtractionMode::PerEntry => segments,
        ExtractionMode::Merged { gap_threshold_secs } => {
            merge_segments(&segments, gap_threshold_secs)
        }
    };
    widen_segments(&segments, min_segment_secs)
}

/// Source ranges of the video path, merged with the video gap tolerance.
pub fn plan_video_segments(entries: &[RetainedEntry], gap_threshold_secs: f64) -> Vec<Segment> {
    let segments: Vec<Segment> = entries.iter().map(RetainedEntry::source_segment).collect();
    let merged = merge_segments(&segments, gap_threshold_secs);
    tracing::info!(
        segments = segments.len(),
        merged = merged.len(),
        "Planned video segments"
    );
    merged
}
