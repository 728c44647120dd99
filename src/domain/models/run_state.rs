//! Project plans, scheduler execution state and the persisted run state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::graph::TaskGraph;
use super::repair::RepairHistory;
use super::verification::VerificationResult;

/// Current on-disk schema version of [`RunState`].
pub const RUN_STATE_VERSION: u32 = 1;

/// Everything a build needs besides the generator: what to build and how
/// it is organized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPlan {
    #[serde(alias = "project_name")]
    pub name: String,

    /// Free-form stack tags, e.g. `python`, `fastapi`, `nextjs`.
    #[serde(default)]
    pub tech_stack: Vec<String>,

    #[serde(default, alias = "core_features")]
    pub features: Vec<String>,

    #[serde(alias = "execution_plan")]
    pub graph: TaskGraph,
}

impl ProjectPlan {
    /// Plan named `name` over `graph`.
    pub fn new(name: impl Into<String>, graph: TaskGraph) -> Self {
        Self {
            name: name.into(),
            tech_stack: Vec::new(),
            features: Vec::new(),
            graph,
        }
    }

    #[must_use]
    pub fn with_stack<I, S>(mut self, tech_stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tech_stack = tech_stack.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }
}

/// One task completion, in the order the scheduler observed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: String,
    /// 1-based wave number within the run that completed the task.
    pub wave: usize,
    /// 0-based global completion order.
    pub sequence: usize,
    pub completed_at: DateTime<Utc>,
}

/// The scheduler's only mutable state: a grow-only set of completed ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    completed: BTreeSet<String>,
    #[serde(default)]
    log: Vec<CompletionRecord>,
}

impl ExecutionState {
    /// Nothing completed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from ids completed by an earlier run.
    pub fn resumed<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            completed: ids.into_iter().map(Into::into).collect(),
            log: Vec::new(),
        }
    }

    /// Record a completion. Returns `false` if the id was already completed.
    pub fn mark_completed(&mut self, task_id: &str, wave: usize) -> bool {
        if !self.completed.insert(task_id.to_string()) {
            return false;
        }
        self.log.push(CompletionRecord {
            task_id: task_id.to_string(),
            wave,
            sequence: self.log.len(),
            completed_at: Utc::now(),
        });
        true
    }

    /// Completed task ids.
    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    /// Whether `task_id` has completed.
    pub fn is_completed(&self, task_id: &str) -> bool {
        self.completed.contains(task_id)
    }

    /// Completions made in this run (not those carried in by a resume).
    pub fn log(&self) -> &[CompletionRecord] {
        &self.log
    }
}

/// Everything persisted at the project root between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub version: u32,
    pub plan: ProjectPlan,
    #[serde(default)]
    pub completed: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verification: Option<VerificationResult>,
    #[serde(default)]
    pub repair_history: RepairHistory,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    /// Fresh state for `plan`.
    pub fn new(plan: ProjectPlan) -> Self {
        Self {
            version: RUN_STATE_VERSION,
            plan,
            completed: BTreeSet::new(),
            last_verification: None,
            repair_history: RepairHistory::new(),
            updated_at: Utc::now(),
        }
    }

    /// Stamp `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
