//! AutoCut Processing Core
//!
//! Turns a parsed subtitle timeline into cutting decisions:
//! - **Selection:** Window the timeline and drop rejected cues
//! - **Merging:** Coalesce neighbouring segments within a gap tolerance
//! - **Renumbering:** Lay retained cues end to end on a new timeline
//! - **Planning:** Extraction ranges, batches, and filter-graph chunks
//!
//! This crate is pure computation: no I/O and no external processes.
//! All inputs are data; all outputs are data.

pub mod batch;
pub mod merger;
pub mod plan;
pub mod renumber;
pub mod selector;

pub use batch::{chunk_size, partition, Batch};
pub use merger::{merge_segments, widen_segments};
pub use plan::{plan_extraction, plan_video_segments, ExtractionMode};
pub use renumber::{renumber, total_duration};
pub use selector::{select, Selection, SelectionWindow};
