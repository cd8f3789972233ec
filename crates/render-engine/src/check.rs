//! Host readiness report.

use std::fmt;

use serde::Serialize;

use autocut_common::memory::MemoryProbe;

use crate::capability::AacEncoder;
use crate::command::Encoder;

/// What the host offers a cutting run.
#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub cores: usize,
    pub available_memory_bytes: Option<u64>,
    pub total_memory_bytes: Option<u64>,
    pub memory_floor_bytes: u64,
    /// First line of the encoder's version banner, if it ran.
    pub encoder_version: Option<String>,
    pub aac_encoder: AacEncoder,
}

impl SystemReport {
    pub async fn collect(
        encoder: &dyn Encoder,
        memory: &dyn MemoryProbe,
        memory_floor_bytes: u64,
    ) -> Self {
        let encoder_version = match encoder.query(&["-version"]).await {
            Ok(out) => out.lines().next().map(|l| l.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Encoder version query failed");
                None
            }
        };
        Self {
            cores: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            available_memory_bytes: memory.available_bytes(),
            total_memory_bytes: memory.total_bytes(),
            memory_floor_bytes,
            encoder_version,
            aac_encoder: AacEncoder::detect(encoder).await,
        }
    }

    /// Whether a cut could start on this host.
    pub fn is_ready(&self) -> bool {
        self.encoder_version.is_some()
            && self
                .available_memory_bytes
                .map_or(true, |a| a >= self.memory_floor_bytes)
    }
}

fn gib(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) => format!("{:.2} GiB", b as f64 / (1024.0 * 1024.0 * 1024.0)),
        None => "unknown".to_string(),
    }
}

impl fmt::Display for SystemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU cores:        {}", self.cores)?;
        writeln!(
            f,
            "Memory:           {} available / {} total (floor {})",
            gib(self.available_memory_bytes),
            gib(self.total_memory_bytes),
            gib(Some(self.memory_floor_bytes))
        )?;
        writeln!(
            f,
            "Encoder:          {}",
            self.encoder_version.as_deref().unwrap_or("not found")
        )?;
        writeln!(f, "AAC encoder:      {}", self.aac_encoder.name())?;
        write!(
            f,
            "Status:           {}",
            if self.is_ready() { "ready" } else { "not ready" }
        )
    }
}
