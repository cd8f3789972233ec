//! Run progress reporting.

use std::sync::Arc;

/// Progress callback for a cutting run.
pub type ProgressCallback = Arc<dyn Fn(CutProgress) + Send + Sync>;

/// Progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutProgress {
    /// Current stage.
    pub stage: CutStage,

    /// Units finished in this stage (batches, chunks, ...).
    pub completed: usize,

    /// Units in this stage.
    pub total: usize,
}

impl CutProgress {
    /// Stage progress in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }
}

/// Stages of a cutting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutStage {
    Preparing,
    Decoding,
    Extracting,
    Encoding,
    Video,
    Subtitles,
    Complete,
}

impl CutStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Decoding => "decoding",
            Self::Extracting => "extracting",
            Self::Encoding => "encoding",
            Self::Video => "video",
            Self::Subtitles => "subtitles",
            Self::Complete => "complete",
        }
    }
}

/// Optional callback, cloned into each stage that reports.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub fn report(&self, stage: CutStage, completed: usize, total: usize) {
        if let Some(cb) = &self.callback {
            cb(CutProgress {
                stage,
                completed,
                total,
            });
        }
    }
}
