//! System memory probing and the pre-flight memory floor.

use crate::error::{AutocutError, AutocutResult};

/// Source of memory figures, abstracted so callers can be tested.
pub trait MemoryProbe: Send + Sync {
    /// Bytes the system can hand out without swapping, if known.
    fn available_bytes(&self) -> Option<u64>;

    /// Total installed memory, if known.
    fn total_bytes(&self) -> Option<u64>;
}

/// Reads the host's memory figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> Option<u64> {
        meminfo_field("MemAvailable").or_else(sysinfo_free)
    }

    fn total_bytes(&self) -> Option<u64> {
        meminfo_field("MemTotal").or_else(sysinfo_total)
    }
}

/// Fixed figures, for tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory {
    pub available: Option<u64>,
    pub total: Option<u64>,
}

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> Option<u64> {
        self.available
    }

    fn total_bytes(&self) -> Option<u64> {
        self.total
    }
}

/// Fail fast when available memory is below `floor_bytes`.
///
/// Must be called before any extraction buffer is allocated. When the
/// platform cannot report memory, the check is skipped with a warning.
pub fn ensure_memory_floor(probe: &dyn MemoryProbe, floor_bytes: u64) -> AutocutResult<()> {
    match probe.available_bytes() {
        Some(available) if available < floor_bytes => {
            tracing::error!(
                available_bytes = available,
                required_bytes = floor_bytes,
                "Memory floor not met"
            );
            Err(AutocutError::InsufficientMemory {
                available_bytes: available,
                required_bytes: floor_bytes,
            })
        }
        Some(available) => {
            tracing::debug!(available_bytes = available, "Memory floor satisfied");
            Ok(())
        }
        None => {
            tracing::warn!("Available memory unknown; skipping memory floor check");
            Ok(())
        }
    }
}

fn meminfo_field(field: &str) -> Option<u64> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo(&content, field)
}

/// Extract a `kB` field from `/proc/meminfo` text, in bytes.
fn parse_meminfo(content: &str, field: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?.strip_prefix(':')?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

#[cfg(target_os = "linux")]
fn sysinfo() -> Option<libc::sysinfo> {
    // SAFETY: sysinfo only writes into the zeroed struct we own.
    unsafe {
        let mut info: libc::sysinfo = std::mem::zeroed();
        (libc::sysinfo(&mut info) == 0).then_some(info)
    }
}

#[cfg(target_os = "linux")]
fn sysinfo_free() -> Option<u64> {
    sysinfo().map(|info| info.freeram as u64 * info.mem_unit as u64)
}

#[cfg(target_os = "linux")]
fn sysinfo_total() -> Option<u64> {
    sysinfo().map(|info| info.totalram as u64 * info.mem_unit as u64)
}

#[cfg(not(target_os = "linux"))]
fn sysinfo_free() -> Option<u64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn sysinfo_total() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:       16318480 kB\nMemFree:         1200000 kB\nMemAvailable:    8000000 kB\n";
        assert_eq!(parse_meminfo(text, "MemAvailable"), Some(8_000_000 * 1024));
        assert_eq!(parse_meminfo(text, "MemTotal"), Some(16_318_480 * 1024));
        assert_eq!(parse_meminfo(text, "SwapTotal"), None);
    }

    #[test]
    fn test_floor_not_met() {
        let probe = FixedMemory {
            available: Some(GIB / 2),
            total: Some(8 * GIB),
        };
        let err = ensure_memory_floor(&probe, GIB).unwrap_err();
        assert!(matches!(
            err,
            AutocutError::InsufficientMemory {
                available_bytes,
                required_bytes
            } if available_bytes == GIB / 2 && required_bytes == GIB
        ));
    }

    #[test]
    fn test_floor_met_or_unknown() {
        let plenty = FixedMemory {
            available: Some(4 * GIB),
            total: None,
        };
        assert!(ensure_memory_floor(&plenty, GIB).is_ok());

        let unknown = FixedMemory {
            available: None,
            total: None,
        };
        assert!(ensure_memory_floor(&unknown, GIB).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_memory_reports_on_linux() {
        assert!(SystemMemory.total_bytes().unwrap_or(0) > 0);
    }
}
