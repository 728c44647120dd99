//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces the engine depends on and adapters implement:
//! - Generator: task content and fix synthesis
//! - Planner: intent to project plan
//! - ContextStore: retrieval over generated files
//! - Verifier: build/test pass-fail with diagnostics
//! - ResourceProbe: CPU and memory readings
//! - RunStateStore / CheckpointSink: persisted run state

pub mod context_store;
pub mod generator;
pub mod null_context;
pub mod planner;
pub mod resource_probe;
pub mod run_state_store;
pub mod verifier;

pub use context_store::{ContextMetadata, ContextSnippet, ContextStore};
pub use generator::{
    FailingUnit, FixRequest, GenerationContext, Generator, ProjectFile, ProjectProfile,
};
pub use null_context::NullContextStore;
pub use planner::Planner;
pub use resource_probe::ResourceProbe;
pub use run_state_store::{CheckpointSink, RunStateStore};
pub use verifier::Verifier;
