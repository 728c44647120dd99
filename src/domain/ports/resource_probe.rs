//! Resource probe port - instantaneous CPU and memory readings.

use crate::domain::errors::TelemetryError;
use crate::domain::models::ResourceSample;

pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> Result<ResourceSample, TelemetryError>;
}
