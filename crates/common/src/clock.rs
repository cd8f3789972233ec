//! Time conversion helpers and run timing.
//!
//! Subtitle arithmetic is done on integer microseconds so that adjacent
//! retimed cues share exactly the same boundary and output is reproducible.

use std::time::{Duration, Instant};

/// Microseconds per second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Convert seconds to whole microseconds, rounding to nearest.
pub fn secs_to_micros(secs: f64) -> i64 {
    (secs * MICROS_PER_SEC as f64).round() as i64
}

/// Convert microseconds back to seconds.
pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SEC as f64
}

/// Wall-clock and monotonic anchor for one run.
#[derive(Debug, Clone)]
pub struct RunClock {
    started: Instant,
    started_wall: String,
}

impl RunClock {
    /// Start timing now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Seconds since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// RFC 3339 timestamp at run start.
    pub fn started_wall(&self) -> &str {
        &self.started_wall
    }
}
