//! Show the retimed cues without touching media.

use std::path::PathBuf;

use autocut_processing::{renumber, select, total_duration, SelectionWindow};
use autocut_timeline::{format_timestamp, Timeline};

use crate::SelectionArgs;

pub fn run(subtitles: PathBuf, selection: SelectionArgs) -> anyhow::Result<()> {
    let timeline =
        Timeline::load(&subtitles).map_err(|e| anyhow::anyhow!("Failed to load subtitles: {e}"))?;
    let rejections = selection.rejections()?;
    let window = selection
        .window(&timeline)
        .unwrap_or_else(|| SelectionWindow::full(timeline.len()));

    let selected = select(timeline.entries(), window, &rejections)?;
    let retained = renumber(&selected.retained);

    for entry in &retained {
        println!(
            "[{} - {}] {}",
            format_timestamp(entry.adjusted_start),
            format_timestamp(entry.adjusted_end),
            entry.original.text.replace('\n', " / ")
        );
    }

    println!();
    println!(
        "{} of {} cue(s) kept, {} removed; {:.2}s of {:.2}s",
        retained.len(),
        selected.considered,
        selected.rejected(),
        total_duration(&retained),
        selected.clip_duration()
    );
    Ok(())
}
