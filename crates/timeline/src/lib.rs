//! AutoCut Timeline Model
//!
//! Defines the data contracts for a cutting run:
//! - **Entries:** Timed subtitle cues, indexed 1-based by file position
//! - **Segments:** Source time ranges derived from cues
//! - **Retained entries:** Cues placed on the new, gap-free timeline
//! - **Rejection sets:** Phrases whose cues are removed
//!
//! Times are seconds as `f64`; retiming arithmetic goes through integer
//! microseconds so that output is reproducible.

pub mod entry;
pub mod rejection;
pub mod segment_map;
pub mod srt;

pub use entry::*;
pub use rejection::*;
pub use segment_map::*;
pub use srt::*;
