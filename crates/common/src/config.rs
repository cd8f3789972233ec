//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AutocutError, AutocutResult};

/// Smallest batch size accepted from a user.
pub const MIN_BATCH_SIZE: usize = 100;

/// Largest batch size accepted from a user.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default cutting parameters.
    pub cut: CutDefaults,

    /// External encoder settings.
    pub encoder: EncoderConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default cutting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CutDefaults {
    /// Retained entries per extraction batch.
    pub batch_size: usize,

    /// Gap tolerance when merging audio segments (seconds).
    pub audio_gap_threshold_secs: f64,

    /// Gap tolerance when merging video segments (seconds).
    pub video_gap_threshold_secs: f64,

    /// Zero-length segments are widened to this duration (seconds).
    pub min_segment_secs: f64,

    /// Upper bound on concurrent extraction and compression workers.
    pub max_workers: usize,

    /// Available memory required before extraction starts.
    pub memory_floor_bytes: u64,
}

/// External encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable (name on PATH or absolute path).
    pub program: String,

    /// Media probe executable.
    pub probe_program: String,

    /// Timeout for ordinary invocations (seconds).
    pub default_timeout_secs: u64,

    /// Timeout for the single-pass video filter graph (seconds).
    pub single_pass_timeout_secs: u64,

    /// Timeout per chunk of the chunked video filter graph (seconds).
    pub chunk_timeout_secs: u64,

    /// Decoded PCM sample rate.
    pub sample_rate: u32,

    /// Decoded PCM channel count.
    pub channels: u16,

    /// Largest merged-segment count attempted in one filter graph.
    pub filter_graph_ceiling: usize,

    /// Approximate number of chunks for the chunked tier.
    pub target_chunks: usize,

    /// Upper bound on segments per chunk.
    pub max_chunk_segments: usize,

    /// Diagnostic text kept from a failed invocation (characters).
    pub diagnostic_limit: usize,

    /// Synthesised background size, `WIDTHxHEIGHT`.
    pub background_resolution: String,

    /// Synthesised background colour.
    pub background_color: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "autocut_render=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for CutDefaults {
    fn default() -> Self {
        Self {
            batch_size: 500,
            audio_gap_threshold_secs: 0.1,
            video_gap_threshold_secs: 0.5,
            min_segment_secs: 0.05,
            max_workers: default_workers(),
            memory_floor_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            probe_program: "ffprobe".to_string(),
            default_timeout_secs: 600,
            single_pass_timeout_secs: 1800,
            chunk_timeout_secs: 1200,
            sample_rate: 44100,
            channels: 2,
            filter_graph_ceiling: 50,
            target_chunks: 5,
            max_chunk_segments: 10,
            diagnostic_limit: 500,
            background_resolution: "1280x720".to_string(),
            background_color: "black".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CutDefaults {
    /// Clamp a user-supplied batch size into the accepted range.
    pub fn clamp_batch_size(requested: usize) -> usize {
        requested.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Errors are surfaced, not defaulted.
    pub fn load_from(path: &Path) -> AutocutResult<Self> {
        if !path.exists() {
            return Err(AutocutError::file_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| AutocutError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> AutocutResult<()> {
        if self.cut.max_workers == 0 {
            return Err(AutocutError::config("cut.max_workers must be at least 1"));
        }
        if self.cut.audio_gap_threshold_secs < 0.0 || self.cut.video_gap_threshold_secs < 0.0 {
            return Err(AutocutError::config("gap thresholds must be non-negative"));
        }
        if self.encoder.sample_rate == 0 || self.encoder.channels == 0 {
            return Err(AutocutError::config(
                "encoder.sample_rate and encoder.channels must be positive",
            ));
        }
        if self.encoder.target_chunks == 0 || self.encoder.max_chunk_segments == 0 {
            return Err(AutocutError::config(
                "encoder.target_chunks and encoder.max_chunk_segments must be positive",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("autocut").join("config.json")
}

fn default_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.min(4)
}
