//! Service layer: the build engine's moving parts.
//!
//! - `admission`: resource-adaptive concurrency gate
//! - `wave_scheduler`: dependency-ordered concurrent task execution
//! - `task_builder`: two-phase generation and output writing for one task
//! - `repair_engine`: escalating fix, apply, re-verify state machine
//! - `pipeline`: wiring of the above with persistence

pub mod admission;
pub mod fix_applier;
pub mod pipeline;
pub mod repair_engine;
pub mod task_builder;
pub mod wave_scheduler;
pub mod workspace;

pub use admission::{AdmissionController, AdmissionEvent, AdmissionPermit};
pub use fix_applier::FixApplier;
pub use pipeline::{BuildPipeline, BuildReport, PipelineAdapters};
pub use repair_engine::RepairEngine;
pub use task_builder::{placeholder_content, TaskBuilder, TaskOutcome};
pub use wave_scheduler::{AbortHandle, ScheduleSummary, SchedulerEvent, WaveScheduler};
pub use workspace::{normalize_relative, resolve_output_path, PathLocks, ProjectWorkspace};
