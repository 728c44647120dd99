//! Scripted adapters for tests and the offline demo.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::errors::{GeneratorError, GeneratorResult, PlannerError, TelemetryError};
use crate::domain::models::{FixPlan, ProjectPlan, ResourceSample, Strategy, Task, VerificationResult};
use crate::domain::ports::{
    FailingUnit, FixRequest, GenerationContext, Generator, Planner, ProjectFile, ResourceProbe,
    Verifier,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fix request as the generator saw it.
#[derive(Debug, Clone)]
pub struct RecordedFixRequest {
    pub strategy: Strategy,
    pub error: VerificationResult,
    pub history_len: usize,
    pub failing_unit: Option<FailingUnit>,
    pub project_files: Vec<ProjectFile>,
}

/// Generator that answers from a script.
///
/// Unscripted calls fail with `GeneratorError::Unscripted`, except in echo
/// mode where every output path gets a one-line body naming its task.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    echo: bool,
    task_files: HashMap<String, BTreeMap<String, String>>,
    files: HashMap<(String, String), String>,
    fixes: HashMap<Strategy, Result<FixPlan, String>>,
    fix_requests: Mutex<Vec<RecordedFixRequest>>,
}

impl ScriptedGenerator {
    /// Generator with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator whose files contain their own path.
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Batch answer for `task_id`.
    #[must_use]
    pub fn with_task_files<I, P, C>(mut self, task_id: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        self.task_files.insert(
            task_id.to_string(),
            files.into_iter().map(|(p, c)| (p.into(), c.into())).collect(),
        );
        self
    }

    /// Single-file answer for `path` of `task_id`.
    #[must_use]
    pub fn with_file(mut self, task_id: &str, path: &str, content: impl Into<String>) -> Self {
        self.files
            .insert((task_id.to_string(), path.to_string()), content.into());
        self
    }

    #[must_use]
    pub fn with_fix(mut self, strategy: Strategy, plan: FixPlan) -> Self {
        self.fixes.insert(strategy, Ok(plan));
        self
    }

    #[must_use]
    pub fn with_fix_error(mut self, strategy: Strategy, message: impl Into<String>) -> Self {
        self.fixes.insert(strategy, Err(message.into()));
        self
    }

    /// Fix requests received so far.
    pub fn fix_requests(&self) -> Vec<RecordedFixRequest> {
        lock(&self.fix_requests).clone()
    }

    fn echo_body(task: &Task, path: &str) -> String {
        format!("{path} generated for task {}\n", task.id)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate_task(
        &self,
        task: &Task,
        _context: &GenerationContext,
    ) -> GeneratorResult<BTreeMap<String, String>> {
        if let Some(files) = self.task_files.get(&task.id) {
            return Ok(files.clone());
        }
        if self.echo {
            return Ok(task
                .output_paths
                .iter()
                .map(|p| (p.clone(), Self::echo_body(task, p)))
                .collect());
        }
        Err(GeneratorError::Unscripted(format!("no batch answer for task {}", task.id)))
    }

    async fn generate_file(
        &self,
        task: &Task,
        path: &str,
        _context: &GenerationContext,
    ) -> GeneratorResult<String> {
        if let Some(content) = self.files.get(&(task.id.clone(), path.to_string())) {
            return Ok(content.clone());
        }
        if self.echo {
            return Ok(Self::echo_body(task, path));
        }
        Err(GeneratorError::Unscripted(format!("no answer for {path} of task {}", task.id)))
    }

    async fn propose_fix(&self, request: &FixRequest<'_>) -> GeneratorResult<Option<FixPlan>> {
        lock(&self.fix_requests).push(RecordedFixRequest {
            strategy: request.strategy,
            error: request.error.clone(),
            history_len: request.history.len(),
            failing_unit: request.failing_unit.clone(),
            project_files: request.project_files.clone(),
        });

        match self.fixes.get(&request.strategy) {
            Some(Ok(plan)) => Ok(Some(plan.clone())),
            Some(Err(message)) => Err(GeneratorError::Request(message.clone())),
            None => Ok(None),
        }
    }
}

/// Verifier that replays a fixed sequence of results.
///
/// The last result repeats once the sequence is used up.
#[derive(Debug)]
pub struct SequenceVerifier {
    results: Vec<VerificationResult>,
    calls: AtomicUsize,
}

impl SequenceVerifier {
    /// Verifier returning `results` in order, then repeating the last.
    pub fn new(results: Vec<VerificationResult>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    /// Verifier that always fails.
    pub fn always_failing() -> Self {
        Self::new(vec![VerificationResult::failed("check", 1, "", "still broken")])
    }

    /// Verifier that always passes.
    pub fn passing() -> Self {
        Self::new(vec![VerificationResult::success()])
    }

    /// Number of verification runs.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Verifier for SequenceVerifier {
    async fn verify(&self, _project_root: &Path) -> VerificationResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .get(call)
            .or_else(|| self.results.last())
            .cloned()
            .unwrap_or_else(VerificationResult::success)
    }
}

/// Passes once `marker` exists under the project root.
#[derive(Debug, Clone)]
pub struct MarkerVerifier {
    marker: String,
}

impl MarkerVerifier {
    /// Verifier that passes once `marker` exists.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

#[async_trait]
impl Verifier for MarkerVerifier {
    async fn verify(&self, project_root: &Path) -> VerificationResult {
        let command = format!("test -f {}", self.marker);
        if tokio::fs::try_exists(project_root.join(&self.marker))
            .await
            .unwrap_or(false)
        {
            VerificationResult::success().with_command(command)
        } else {
            VerificationResult::failed(
                command,
                1,
                "",
                format!("{}:1:1: error: required file is missing", self.marker),
            )
        }
    }
}

/// Probe whose reading is set by hand.
#[derive(Debug)]
pub struct FixedProbe {
    sample: Mutex<ResourceSample>,
}

impl FixedProbe {
    /// Probe reporting `sample`.
    pub fn new(sample: ResourceSample) -> Self {
        Self {
            sample: Mutex::new(sample),
        }
    }

    /// Probe reporting an idle machine.
    pub fn idle() -> Self {
        Self::new(ResourceSample::new(10.0, 20.0, 8 * 1024 * 1024 * 1024))
    }

    /// Replace the reported sample.
    pub fn set(&self, sample: ResourceSample) {
        *lock(&self.sample) = sample;
    }
}

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> Result<ResourceSample, TelemetryError> {
        Ok(*lock(&self.sample))
    }
}

/// Planner that returns a prepared plan for any intent.
#[derive(Debug, Clone)]
pub struct MockPlanner {
    plan: ProjectPlan,
}

impl MockPlanner {
    /// Planner returning `plan` for any intent.
    pub fn new(plan: ProjectPlan) -> Self {
        Self { plan }
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, intent: &str) -> Result<ProjectPlan, PlannerError> {
        if intent.trim().is_empty() {
            return Err(PlannerError::Malformed("intent is empty".to_string()));
        }
        Ok(self.plan.clone())
    }
}
