//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use wavesmith::adapters::mock::FixedProbe;
use wavesmith::adapters::{InMemoryContextStore, JsonRunStateStore};
use wavesmith::domain::models::{ProjectPlan, Task, TaskGraph};
use wavesmith::domain::ports::{Generator, Verifier};
use wavesmith::services::PipelineAdapters;

/// Route engine logs to the test harness. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A -> B -> C.
pub fn chain_graph() -> TaskGraph {
    TaskGraph::new(vec![
        Task::new("a", "first").with_outputs(["a.txt"]),
        Task::new("b", "second")
            .with_outputs(["b.txt"])
            .with_dependencies(["a"]),
        Task::new("c", "third")
            .with_outputs(["c.txt"])
            .with_dependencies(["b"]),
    ])
}

/// A -> {B, C} -> D.
pub fn diamond_graph() -> TaskGraph {
    TaskGraph::new(vec![
        Task::new("a", "root").with_outputs(["a.txt"]),
        Task::new("b", "left")
            .with_outputs(["b.txt"])
            .with_dependencies(["a"]),
        Task::new("c", "right")
            .with_outputs(["c.txt"])
            .with_dependencies(["a"]),
        Task::new("d", "join")
            .with_outputs(["d.txt"])
            .with_dependencies(["b", "c"]),
    ])
}

pub fn plan(graph: TaskGraph) -> ProjectPlan {
    ProjectPlan::new("fixture", graph).with_stack(["python"])
}

/// Offline adapters around `generator` and `verifier`, persisting under `root`.
pub fn adapters(
    root: &Path,
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
) -> PipelineAdapters {
    PipelineAdapters {
        generator,
        verifier,
        context_store: Arc::new(InMemoryContextStore::default()),
        probe: Arc::new(FixedProbe::idle()),
        store: Arc::new(JsonRunStateStore::for_project(root)),
    }
}
