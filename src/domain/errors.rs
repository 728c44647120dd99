//! Domain errors for the wavesmith build engine.

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    let mut rendered: Vec<&str> = path.iter().map(String::as_str).collect();
    if let Some(first) = path.first() {
        rendered.push(first.as_str());
    }
    rendered.join(" -> ")
}

/// Construction errors raised while validating a task graph.
///
/// These are fatal: a graph that fails validation is never scheduled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task '{task}' depends on unknown task '{missing_id}'")]
    UnknownDependency { task: String, missing_id: String },

    #[error("Duplicate task id: {id}")]
    DuplicateId { id: String },

    #[error("Task dependency cycle detected: {}", format_cycle_path(.cycle_path))]
    Cycle { cycle_path: Vec<String> },
}

/// Errors that stop a scheduling run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Deadlock: no task is ready but {} remain incomplete: {}", .remaining.len(), .remaining.join(", "))]
    Deadlock { remaining: Vec<String> },

    #[error("Run aborted after {} completed task(s)", .completed.len())]
    Aborted { completed: BTreeSet<String> },

    #[error("Task '{task}' did not produce declared outputs: {}", .paths.join(", "))]
    MissingOutputs { task: String, paths: Vec<String> },

    #[error("Task '{task}' panicked or was cancelled: {reason}")]
    TaskJoin { task: String, reason: String },

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] RunStateError),
}

/// Errors from a [`Generator`](crate::domain::ports::Generator) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Rate limited by generator backend")]
    RateLimited,

    #[error("Generator API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed generator response: {0}")]
    MalformedResponse(String),

    #[error("Generator is not configured: {0}")]
    NotConfigured(String),

    #[error("Generator has no response for: {0}")]
    Unscripted(String),
}

impl GeneratorError {
    /// Build an error from an HTTP status code and body.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            429 => Self::RateLimited,
            _ => Self::Api {
                status,
                message: message.into(),
            },
        }
    }

    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::MalformedResponse(_) | Self::NotConfigured(_) | Self::Unscripted(_) => false,
        }
    }
}

/// Errors from a [`Planner`](crate::domain::ports::Planner).
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Planner backend failed: {0}")]
    Backend(#[from] GeneratorError),

    #[error("Planner returned an unusable plan: {0}")]
    Malformed(String),

    #[error("Planned graph is invalid: {0}")]
    InvalidGraph(#[from] GraphError),
}

/// Context store failures. Callers log and continue with empty context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextStoreError {
    #[error("Context store unavailable: {0}")]
    Unavailable(String),

    #[error("Context insert failed for {path}: {reason}")]
    Insert { path: String, reason: String },

    #[error("Context query failed: {0}")]
    Query(String),
}

/// Telemetry read failures. The admission controller degrades to a
/// conservative sample when it sees one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Resource telemetry unavailable: {0}")]
    Unavailable(String),

    #[error("Resource telemetry returned an invalid reading: {0}")]
    InvalidReading(String),
}

/// Rejected output paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Output path is empty")]
    Empty,

    #[error("Output path must be relative: {0}")]
    Absolute(String),

    #[error("Output path escapes the project root: {0}")]
    EscapesRoot(String),
}

/// Persisted run state failures.
#[derive(Debug, Error)]
pub enum RunStateError {
    #[error("No run state found at {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported run state version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Top-level failures of a build pipeline run.
///
/// Verification failures and repair exhaustion are *outcomes*, reported in
/// the pipeline's report, not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    RunState(#[from] RunStateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
pub type GeneratorResult<T> = Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = GraphError::Cycle {
            cycle_path: vec!["x".into(), "y".into()],
        };
        assert_eq!(err.to_string(), "Task dependency cycle detected: x -> y -> x");
    }

    #[test]
    fn test_generator_error_transience() {
        assert!(GeneratorError::RateLimited.is_transient());
        assert!(GeneratorError::Timeout(30).is_transient());
        assert!(GeneratorError::from_status(503, "busy").is_transient());
        assert!(!GeneratorError::from_status(400, "bad").is_transient());
        assert!(!GeneratorError::MalformedResponse("x".into()).is_transient());
        assert_eq!(GeneratorError::from_status(429, ""), GeneratorError::RateLimited);
    }

    #[test]
    fn test_deadlock_lists_remaining() {
        let err = SchedulerError::Deadlock {
            remaining: vec!["b".into(), "c".into()],
        };
        assert!(err.to_string().contains("2 remain incomplete: b, c"));
    }
}
