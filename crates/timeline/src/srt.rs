//! SRT subtitle parsing and composition.
//!
//! Input tolerates a UTF-8 BOM, CRLF line endings, `,` or `.` as the
//! fractional separator, and 1 to 6 fractional digits. Output always uses
//! `HH:MM:SS,mmm`, numbers cues from 1, and separates cues with a blank line.

use std::path::Path;

use autocut_common::error::{AutocutError, AutocutResult};

use crate::entry::{RetainedEntry, TimedEntry, Timeline};

const BOM: char = '\u{feff}';

impl Timeline {
    /// Parse SRT text into a timeline.
    pub fn parse_srt(content: &str) -> AutocutResult<Self> {
        parse_srt(content).map(Timeline::new)
    }

    /// Read and parse an SRT file.
    pub fn load(path: &Path) -> AutocutResult<Self> {
        if !path.exists() {
            return Err(AutocutError::file_not_found(path));
        }
        let bytes = std::fs::read(path)?;
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
                let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
                return Err(AutocutError::parse(line, "invalid UTF-8"));
            }
        };
        let timeline = Self::parse_srt(&content)?;
        tracing::info!(
            path = %path.display(),
            entries = timeline.len(),
            "Loaded subtitles"
        );
        Ok(timeline)
    }
}

/// Parse SRT text into entries indexed by position (1-based).
pub fn parse_srt(content: &str) -> AutocutResult<Vec<TimedEntry>> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let mut lines = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .peekable();

    let mut entries: Vec<TimedEntry> = Vec::new();
    let mut out_of_order = 0usize;

    loop {
        // Skip blank separators.
        while matches!(lines.peek(), Some((_, line)) if line.trim().is_empty()) {
            lines.next();
        }
        let Some((number_line, number)) = lines.next() else {
            break;
        };
        if number.trim().parse::<u64>().is_err() {
            return Err(AutocutError::parse(
                number_line,
                format!("expected cue number, found {:?}", number.trim()),
            ));
        }

        let Some((timing_line, timing)) = lines.next() else {
            return Err(AutocutError::parse(
                number_line,
                "cue number without timing line",
            ));
        };
        let (start, end) =
            parse_timing_line(timing).map_err(|msg| AutocutError::parse(timing_line, msg))?;

        let mut text_lines = Vec::new();
        while let Some((_, line)) = lines.peek() {
            if line.trim().is_empty() {
                break;
            }
            text_lines.push(*line);
            lines.next();
        }

        if let Some(prev) = entries.last() {
            if start < prev.start {
                out_of_order += 1;
            }
        }
        entries.push(TimedEntry::new(
            entries.len() + 1,
            start,
            end,
            text_lines.join("\n"),
        ));
    }

    if out_of_order > 0 {
        tracing::warn!(count = out_of_order, "Subtitle cues are not ordered by start time");
    }
    Ok(entries)
}

/// Parse `START --> END [settings]`.
fn parse_timing_line(line: &str) -> Result<(f64, f64), String> {
    let (left, right) = line
        .split_once("-->")
        .ok_or_else(|| format!("expected timing line, found {:?}", line.trim()))?;
    let start = parse_timestamp(left.trim())?;
    let end_token = right.split_whitespace().next().unwrap_or("");
    let end = parse_timestamp(end_token)?;
    if end < start {
        return Err(format!("cue ends before it starts: {}", line.trim()));
    }
    Ok((start, end))
}

/// Parse `HH:MM:SS,fff` into seconds.
pub fn parse_timestamp(text: &str) -> Result<f64, String> {
    let bad = || format!("malformed timestamp {text:?}");

    let mut parts = text.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad());
    };
    let (whole, frac) = match s.split_once([',', '.']) {
        Some((whole, frac)) => (whole, frac),
        None => (s, "0"),
    };

    let digits = |v: &str| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || !digits(m) || !digits(whole) || !digits(frac) || frac.len() > 6 {
        return Err(bad());
    }

    let hours: i64 = h.parse().map_err(|_| bad())?;
    let minutes: i64 = m.parse().map_err(|_| bad())?;
    let seconds: i64 = whole.parse().map_err(|_| bad())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(bad());
    }
    let padded = format!("{frac:0<6}");
    let micros: i64 = padded.parse().map_err(|_| bad())?;

    let total = ((hours * 60 + minutes) * 60 + seconds) * 1_000_000 + micros;
    Ok(total as f64 / 1_000_000.0)
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Compose retimed entries as SRT, numbering cues from 1.
pub fn compose_srt(entries: &[RetainedEntry]) -> String {
    let mut output = String::new();

    for (i, entry) in entries.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(entry.adjusted_start),
            format_timestamp(entry.adjusted_end),
        ));
        output.push_str(&entry.original.text);
        output.push_str("\n\n");
    }

    output
}

/// Write retimed entries to `path` as SRT.
pub fn write_srt(path: &Path, entries: &[RetainedEntry]) -> AutocutResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, compose_srt(entries))?;
    tracing::info!(path = %path.display(), cues = entries.len(), "Wrote subtitles");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:00,000 --> 00:00:01,000\nok\n\n2\n00:00:01,000 --> 00:00:02,500\nhello\nworld\n\n3\n00:00:02,500 --> 00:00:04,000\nok\n";

    #[test]
    fn test_parse_basic() {
        let entries = parse_srt(SAMPLE).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].start, 1.0);
        assert_eq!(entries[1].end, 2.5);
        assert_eq!(entries[1].text, "hello\nworld");
    }

    #[test]
    fn test_parse_bom_crlf_and_dot_separator() {
        let text = "\u{feff}1\r\n00:00:01.5 --> 00:00:02.250000 X1:10\r\nhi\r\n\r\n";
        let entries = parse_srt(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, 1.5);
        assert_eq!(entries[0].end, 2.25);
        assert_eq!(entries[0].text, "hi");
    }

    #[test]
    fn test_index_is_position_not_cue_number() {
        let text = "7\n00:00:00,000 --> 00:00:01,000\na\n\n9\n00:00:01,000 --> 00:00:02,000\nb\n";
        let entries = parse_srt(text).unwrap();
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[1].index, 2);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_srt("1\n00:00:00,000 -> 00:00:01,000\nx\n").unwrap_err();
        assert!(matches!(err, AutocutError::Parse { line: 2, .. }));

        let err = parse_srt("1\n00:00:00,000 --> 00:00:01,000\nx\n\nabc\n").unwrap_err();
        assert!(matches!(err, AutocutError::Parse { line: 5, .. }));

        let err = parse_srt("1\n00:00:05,000 --> 00:00:01,000\nx\n").unwrap_err();
        assert!(matches!(err, AutocutError::Parse { line: 2, .. }));

        let err = parse_srt("1\n00:61:00,000 --> 01:00:00,000\nx\n").unwrap_err();
        assert!(matches!(err, AutocutError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_srt("").unwrap().is_empty());
        assert!(parse_srt("\u{feff}\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_timestamp(2.9999), "00:00:03,000");
    }

    #[test]
    fn test_compose_renumbers_from_one() {
        let entries = vec![
            RetainedEntry::place(TimedEntry::new(4, 10.0, 11.5, "first"), 0).0,
            RetainedEntry::place(TimedEntry::new(9, 20.0, 21.0, "second"), 1_500_000).0,
        ];
        assert_eq!(
            compose_srt(&entries),
            "1\n00:00:00,000 --> 00:00:01,500\nfirst\n\n2\n00:00:01,500 --> 00:00:02,500\nsecond\n\n"
        );
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Timeline::load(Path::new("/no/such/file.srt")).unwrap_err();
        assert!(matches!(err, AutocutError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.srt");
        std::fs::write(&path, b"1\n00:00:00,000 --> 00:00:01,000\n\xff\xfe\n").unwrap();
        let err = Timeline::load(&path).unwrap_err();
        assert!(matches!(err, AutocutError::Parse { line: 3, .. }));
    }
}
