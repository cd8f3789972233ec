//! Summary of a finished run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::audio::OutputFormat;
use crate::fallback::ReconstructionTier;

/// Outcome of a successful cut.
#[derive(Debug, Clone, Serialize)]
pub struct CutReport {
    pub output_path: PathBuf,
    pub output_bytes: u64,
    pub subtitle_path: PathBuf,
    pub segment_map_path: Option<PathBuf>,
    pub format: OutputFormat,
    /// Size of the extracted clip before cutting.
    pub clip_bytes: u64,
    pub considered: usize,
    pub retained: usize,
    pub batches: usize,
    /// Seconds of material kept.
    pub retained_secs: f64,
    /// Set when a video track was rebuilt from the source.
    pub tier: Option<ReconstructionTier>,
    pub started_at: String,
    pub elapsed_secs: f64,
}

impl CutReport {
    /// Output size relative to the clip, in percent.
    pub fn compression_ratio(&self) -> f64 {
        if self.clip_bytes == 0 {
            return 0.0;
        }
        self.output_bytes as f64 / self.clip_bytes as f64 * 100.0
    }

    pub fn rejected(&self) -> usize {
        self.considered.saturating_sub(self.retained)
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

impl fmt::Display for CutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Output:     {}", self.output_path.display())?;
        writeln!(f, "Subtitles:  {}", self.subtitle_path.display())?;
        if let Some(map) = &self.segment_map_path {
            writeln!(f, "Segments:   {}", map.display())?;
        }
        writeln!(
            f,
            "Entries:    {} retained, {} removed of {}",
            self.retained,
            self.rejected(),
            self.considered
        )?;
        writeln!(f, "Duration:   {:.2}s in {} batch(es)", self.retained_secs, self.batches)?;
        if let Some(tier) = self.tier {
            writeln!(f, "Video:      {tier}")?;
        }
        writeln!(
            f,
            "Size:       {:.2} MB (clip {:.2} MB, {:.1}%)",
            mb(self.output_bytes),
            mb(self.clip_bytes),
            self.compression_ratio()
        )?;
        write!(f, "Elapsed:    {:.1}s", self.elapsed_secs)
    }
}
