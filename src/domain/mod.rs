//! Domain layer for the wavesmith build engine
//!
//! Core models (task graphs, resource samples, verification results, fix
//! plans, repair history) and the port traits that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    ContextStoreError, GeneratorError, GraphError, PathError, PipelineError, PlannerError,
    RunStateError, SchedulerError, TelemetryError,
};
