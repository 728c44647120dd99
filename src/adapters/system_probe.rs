//! Host CPU and memory readings via `sysinfo`.

use std::sync::{Mutex, PoisonError};

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

use crate::domain::errors::TelemetryError;
use crate::domain::models::ResourceSample;
use crate::domain::ports::ResourceProbe;

/// Samples the whole host.
///
/// CPU usage is measured between consecutive refreshes, so the first
/// reading after construction may under-report.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    /// Probe over a fresh system snapshot.
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: Mutex::new(System::new_with_specifics(refresh_kind)),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProbe").finish_non_exhaustive()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&self) -> Result<ResourceSample, TelemetryError> {
        let mut sys = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(TelemetryError::Unavailable("total memory reported as zero".into()));
        }

        let cpu_percent = sys.global_cpu_usage();
        if !cpu_percent.is_finite() {
            return Err(TelemetryError::InvalidReading(format!("cpu usage {cpu_percent}")));
        }

        #[allow(clippy::cast_precision_loss)]
        let memory_percent = (sys.used_memory() as f64 / total as f64 * 100.0) as f32;
        let sample = ResourceSample::new(
            cpu_percent.clamp(0.0, 100.0),
            memory_percent.clamp(0.0, 100.0),
            sys.available_memory(),
        );

        debug!(
            cpu_percent = sample.cpu_percent,
            memory_percent = sample.memory_percent,
            "resource sample"
        );
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_in_range() {
        let probe = SysinfoProbe::new();
        if let Ok(sample) = probe.sample() {
            assert!((0.0..=100.0).contains(&sample.cpu_percent));
            assert!((0.0..=100.0).contains(&sample.memory_percent));
        }
    }
}
