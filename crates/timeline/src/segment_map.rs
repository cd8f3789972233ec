//! JSON map from retained cues back to their source times.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use autocut_common::error::AutocutResult;

use crate::entry::RetainedEntry;

/// One retained cue's position in the source and in the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMapEntry {
    pub original_start: f64,
    pub original_end: f64,
    pub duration: f64,
    pub adjusted_start: f64,
}

impl From<&RetainedEntry> for SegmentMapEntry {
    fn from(entry: &RetainedEntry) -> Self {
        Self {
            original_start: round_ms(entry.original.start),
            original_end: round_ms(entry.original.end),
            duration: round_ms(entry.original.duration()),
            adjusted_start: round_ms(entry.adjusted_start),
        }
    }
}

/// Build the map for a retimed sequence.
pub fn segment_map(entries: &[RetainedEntry]) -> Vec<SegmentMapEntry> {
    entries.iter().map(SegmentMapEntry::from).collect()
}

/// Write the map as pretty JSON.
pub fn write_segment_map(path: &Path, entries: &[RetainedEntry]) -> AutocutResult<()> {
    let json = serde_json::to_string_pretty(&segment_map(entries))?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), segments = entries.len(), "Wrote segment map");
    Ok(())
}

/// Default map location next to a subtitle file: `<stem>_segments.json`.
pub fn segment_map_path_for(subtitle_path: &Path) -> PathBuf {
    let stem = subtitle_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    subtitle_path.with_file_name(format!("{stem}_segments.json"))
}

fn round_ms(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
