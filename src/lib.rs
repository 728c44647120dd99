//! Wavesmith - wave-scheduled project builds with self-repair
//!
//! Wavesmith takes a graph of file-producing tasks, generates them in
//! dependency-ordered waves under a resource-adaptive concurrency limit,
//! verifies the result, and walks an escalating ladder of repair strategies
//! when verification fails.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): admission control, wave scheduling,
//!   task building, repair and the build pipeline
//! - **Adapters** (`adapters`): LLM generator/planner, command verifier,
//!   system probe, context store and run state persistence
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and
//!   process execution
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wavesmith::adapters::mock::{FixedProbe, MarkerVerifier, ScriptedGenerator};
//! use wavesmith::adapters::{InMemoryContextStore, JsonRunStateStore};
//! use wavesmith::services::{BuildPipeline, PipelineAdapters};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let root = std::path::Path::new("out");
//!     let adapters = PipelineAdapters {
//!         generator: Arc::new(ScriptedGenerator::echo()),
//!         verifier: Arc::new(MarkerVerifier::new("README.md")),
//!         context_store: Arc::new(InMemoryContextStore::default()),
//!         probe: Arc::new(FixedProbe::idle()),
//!         store: Arc::new(JsonRunStateStore::for_project(root)),
//!     };
//!     let plan = wavesmith::cli::commands::demo::demo_plan();
//!     let report = BuildPipeline::new(Default::default(), root, adapters).build(plan).await?;
//!     println!("success: {}", report.is_success());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{GraphError, PipelineError, SchedulerError};
pub use domain::models::{
    compute_limit, Config, ConcurrencyBounds, FixPlan, ProjectPlan, RepairReport, ResourceSample,
    RunState, Strategy, Task, TaskGraph, ValidatedGraph, VerificationResult,
};
pub use domain::ports::{ContextStore, Generator, Planner, ResourceProbe, RunStateStore, Verifier};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AdmissionController, BuildPipeline, BuildReport, PipelineAdapters, RepairEngine,
    WaveScheduler,
};
