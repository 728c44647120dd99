//! Resource samples and the concurrency policy derived from them.

use serde::{Deserialize, Serialize};

/// Below this CPU and memory usage (both) the limit may grow.
pub const SCALE_UP_BELOW_PERCENT: f32 = 60.0;

/// An instantaneous reading of system load. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_available_bytes: u64,
}

impl ResourceSample {
    /// Sample from raw readings.
    pub const fn new(cpu_percent: f32, memory_percent: f32, memory_available_bytes: u64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            memory_available_bytes,
        }
    }

    /// Stand-in used when telemetry cannot be read: moderately loaded, so
    /// the limit neither grows nor collapses under default thresholds.
    pub const fn conservative() -> Self {
        Self::new(70.0, 70.0, 0)
    }
}

/// Bounds and thresholds for the admission limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyBounds {
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_cpu_warning")]
    pub cpu_warning: f32,

    #[serde(default = "default_cpu_critical")]
    pub cpu_critical: f32,

    #[serde(default = "default_memory_warning")]
    pub memory_warning: f32,

    #[serde(default = "default_memory_critical")]
    pub memory_critical: f32,
}

const fn default_min_workers() -> usize {
    1
}

const fn default_max_workers() -> usize {
    3
}

const fn default_cpu_warning() -> f32 {
    80.0
}

const fn default_cpu_critical() -> f32 {
    85.0
}

const fn default_memory_warning() -> f32 {
    75.0
}

const fn default_memory_critical() -> f32 {
    80.0
}

impl Default for ConcurrencyBounds {
    fn default() -> Self {
        Self {
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            cpu_warning: default_cpu_warning(),
            cpu_critical: default_cpu_critical(),
            memory_warning: default_memory_warning(),
            memory_critical: default_memory_critical(),
        }
    }
}

impl ConcurrencyBounds {
    /// Default thresholds with the given worker range.
    pub fn with_workers(min_workers: usize, max_workers: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            ..Self::default()
        }
    }

    /// Clamp `limit` into the worker range.
    pub fn clamp(&self, limit: usize) -> usize {
        limit.clamp(self.min_workers, self.max_workers.max(self.min_workers))
    }
}

/// Load classification used by [`compute_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLevel {
    Critical,
    High,
    Idle,
    Normal,
}

impl ConcurrencyBounds {
    /// Load level of `sample` against the thresholds.
    pub fn classify(&self, sample: &ResourceSample) -> LoadLevel {
        if sample.cpu_percent > self.cpu_critical || sample.memory_percent > self.memory_critical {
            LoadLevel::Critical
        } else if sample.cpu_percent > self.cpu_warning
            || sample.memory_percent > self.memory_warning
        {
            LoadLevel::High
        } else if sample.cpu_percent < SCALE_UP_BELOW_PERCENT
            && sample.memory_percent < SCALE_UP_BELOW_PERCENT
        {
            LoadLevel::Idle
        } else {
            LoadLevel::Normal
        }
    }
}

/// Next admission limit given the latest sample.
///
/// Critical load drops the limit by 2, high load by 1, and idle load raises
/// it by 1. The result always lies in `[min_workers, max_workers]`.
pub fn compute_limit(
    sample: &ResourceSample,
    previous_limit: usize,
    bounds: &ConcurrencyBounds,
) -> usize {
    let next = match bounds.classify(sample) {
        LoadLevel::Critical => previous_limit.saturating_sub(2),
        LoadLevel::High => previous_limit.saturating_sub(1),
        LoadLevel::Idle if previous_limit < bounds.max_workers => previous_limit + 1,
        LoadLevel::Idle | LoadLevel::Normal => previous_limit,
    };
    bounds.clamp(next)
}
