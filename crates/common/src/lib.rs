//! AutoCut Common Utilities
//!
//! Shared infrastructure for all AutoCut crates:
//! - Error types and result aliases
//! - Time conversion and run timing
//! - Tracing/logging initialization
//! - Configuration loading
//! - Scoped working directories and the memory floor check

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod workdir;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use memory::*;
pub use workdir::*;
