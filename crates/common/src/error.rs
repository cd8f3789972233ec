//! Error types shared across AutoCut crates.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for AutoCut operations.
#[derive(Debug, thiserror::Error)]
pub enum AutocutError {
    #[error("Subtitle parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid subtitle window {start}-{end} (subtitle count: {total})")]
    Range {
        start: usize,
        end: usize,
        total: usize,
    },

    #[error(
        "Insufficient memory: {:.2} GiB available, {:.2} GiB required",
        gib(*available_bytes),
        gib(*required_bytes)
    )]
    InsufficientMemory {
        available_bytes: u64,
        required_bytes: u64,
    },

    #[error("{program} timed out after {timeout_secs} seconds")]
    EncoderTimeout { program: String, timeout_secs: u64 },

    #[error(transparent)]
    EncoderFailure(#[from] EncoderFailure),

    #[error("Video reconstruction failed after all tiers: {}", causes.join("; "))]
    ReconstructionFailed { causes: Vec<String> },

    #[error("Encoder executable not found: {program}")]
    EncoderNotFound { program: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No subtitle entries survived filtering")]
    NothingRetained,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AutocutError.
pub type AutocutResult<T> = Result<T, AutocutError>;

impl AutocutError {
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Whether a video reconstruction tier may escalate past this error.
    ///
    /// Cancellation and pre-flight failures abort the whole run instead.
    pub fn is_recoverable_tier_failure(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled | Self::InsufficientMemory { .. } | Self::EncoderNotFound { .. }
        )
    }
}

/// Structured failure of one external encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct EncoderFailure {
    /// Executable that was invoked.
    pub program: String,

    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,

    /// Captured diagnostic output, already truncated.
    pub diagnostic: String,
}

impl EncoderFailure {
    /// Build a failure record, truncating the diagnostic to `limit` characters.
    pub fn new(
        program: impl Into<String>,
        exit_code: Option<i32>,
        diagnostic: &str,
        limit: usize,
    ) -> Self {
        Self {
            program: program.into(),
            exit_code,
            diagnostic: truncate_diagnostic(diagnostic, limit),
        }
    }
}

impl fmt::Display for EncoderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} exited with status {}", self.program, code)?,
            None => write!(f, "{} was terminated by a signal", self.program)?,
        }
        if !self.diagnostic.is_empty() {
            write!(f, ": {}", self.diagnostic)?;
        }
        Ok(())
    }
}

/// Trim diagnostic text and keep at most `limit` characters.
pub fn truncate_diagnostic(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_diagnostic_respects_char_boundaries() {
        let text = "错误".repeat(400);
        let truncated = truncate_diagnostic(&text, 500);
        assert_eq!(truncated.chars().count(), 501);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn test_truncate_diagnostic_keeps_short_text() {
        assert_eq!(truncate_diagnostic("  boom \n", 500), "boom");
    }

    #[test]
    fn test_encoder_failure_display() {
        let failure = EncoderFailure::new("ffmpeg", Some(1), "Invalid argument\n", 500);
        assert_eq!(
            AutocutError::from(failure).to_string(),
            "ffmpeg exited with status 1: Invalid argument"
        );
    }

    #[test]
    fn test_range_error_display() {
        let err = AutocutError::Range {
            start: 5,
            end: 2,
            total: 10,
        };
        assert_eq!(
            err.to_string(),
            "Invalid subtitle window 5-2 (subtitle count: 10)"
        );
    }

    #[test]
    fn test_cancellation_is_not_recoverable() {
        assert!(!AutocutError::Cancelled.is_recoverable_tier_failure());
        assert!(AutocutError::EncoderTimeout {
            program: "ffmpeg".into(),
            timeout_secs: 1
        }
        .is_recoverable_tier_failure());
    }
}
