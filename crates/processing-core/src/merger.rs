//! Segment merging within a gap tolerance.

use autocut_timeline::Segment;

/// Coalesce segments whose gap to the running segment is at most `gap_threshold`.
///
/// Input order does not matter; it is sorted by start first. Output is
/// sorted and non-overlapping, and each input lies inside exactly one
/// output segment.
pub fn merge_segments(segments: &[Segment], gap_threshold: f64) -> Vec<Segment> {
    let gap_threshold = gap_threshold.max(0.0);
    let mut sorted = segments.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut current = first;
    for next in iter {
        if next.start - current.end <= gap_threshold {
            current.end = current.end.max(next.end);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);

    tracing::debug!(
        input = segments.len(),
        merged = merged.len(),
        gap_threshold,
        "Merged segments"
    );
    merged
}

/// Widen zero- or near-zero-length segments to `min_secs`.
pub fn widen_segments(segments: &[Segment], min_secs: f64) -> Vec<Segment> {
    segments.iter().map(|s| s.widened_to(min_secs)).collect()
}
