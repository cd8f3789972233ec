//! AutoCut Render Engine
//!
//! Media side of a cutting run: decodes the selected clip, copies the
//! retained ranges out of it, and encodes them into the final artifact.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 ── extract audio ──┐
//! input.mp3 ───────────────────┴── clip span ── decode (PCM WAV)
//!                                                     │
//! subtitles.srt ── select ── renumber ── plan ────────┤
//!                                                     ├── batch_0000.wav
//!                                                     ├── batch_0001.wav ...
//!                                                     ▼
//!                                   assemble (mp3/m4a/wav/flac/ogg)
//!                                                     │
//!                      ┌──────────────────────────────┤ mp4
//!                      ▼                              ▼
//!        video fallback chain (video input)   background (audio input)
//!                      │                              │
//!                      └──────────────┬───────────────┘
//!                                     ▼
//!                          output + retimed subtitles
//! ```

pub mod audio;
pub mod capability;
pub mod check;
pub mod command;
pub mod extractor;
pub mod fallback;
pub mod filter_graph;
pub mod pcm;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod synth;

pub use audio::{OutputFormat, Quality};
pub use command::{Encoder, EncoderCommand, EncoderRunner};
pub use fallback::ReconstructionTier;
pub use pipeline::{run_cut, CutContext, CutJob};
pub use progress::{CutProgress, CutStage, ProgressCallback};
pub use report::CutReport;
