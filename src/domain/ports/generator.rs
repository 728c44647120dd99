//! Generator port - produces file contents for tasks and fixes for failures.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::GeneratorResult;
use crate::domain::models::{FixPlan, ProjectPlan, RepairAttempt, Strategy, Task, VerificationResult};

use super::context_store::ContextSnippet;

/// Project-level facts shared with every generator call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProfile {
    pub name: String,
    pub tech_stack: Vec<String>,
    pub features: Vec<String>,
}

impl From<&ProjectPlan> for ProjectProfile {
    fn from(plan: &ProjectPlan) -> Self {
        Self {
            name: plan.name.clone(),
            tech_stack: plan.tech_stack.clone(),
            features: plan.features.clone(),
        }
    }
}

/// Input for generating one task's files.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub profile: ProjectProfile,
    /// Retrieved snippets from earlier outputs, best match first.
    pub snippets: Vec<ContextSnippet>,
}

/// A project file handed to a fix strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
}

/// The file blamed for a failure, with the task that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailingUnit {
    pub path: String,
    /// Current content, if the file exists.
    pub content: Option<String>,
    pub task: Option<Task>,
}

/// Everything a strategy needs to propose a fix.
#[derive(Debug, Clone)]
pub struct FixRequest<'a> {
    pub strategy: Strategy,
    pub error: &'a VerificationResult,
    /// Earlier attempts in this repair run, oldest first.
    pub history: &'a [RepairAttempt],
    pub profile: &'a ProjectProfile,
    /// Files relevant to the strategy (manifests for holistic diagnosis).
    pub project_files: Vec<ProjectFile>,
    pub failing_unit: Option<FailingUnit>,
}

/// Content and fix synthesis.
///
/// Implementations may be slow or unreliable. Errors and partial answers
/// are absorbed by the scheduler and the repair engine; they never abort a run.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Produce contents for all of `task.output_paths` in one call.
    async fn generate_task(
        &self,
        task: &Task,
        context: &GenerationContext,
    ) -> GeneratorResult<BTreeMap<String, String>>;

    /// Produce contents for a single output path of `task`.
    async fn generate_file(
        &self,
        task: &Task,
        path: &str,
        context: &GenerationContext,
    ) -> GeneratorResult<String>;

    /// Propose a fix for the failure using the requested strategy.
    /// `Ok(None)` means the strategy has nothing to offer.
    async fn propose_fix(&self, request: &FixRequest<'_>) -> GeneratorResult<Option<FixPlan>>;
}
