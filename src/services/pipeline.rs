//! Build pipeline: validate, schedule, verify, repair, persist.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument, warn};

use crate::domain::errors::{PipelineError, PlannerError, RunStateError};
use crate::domain::models::{
    Config, ExecutionState, ProjectPlan, RepairReport, RunState, ValidatedGraph,
    VerificationResult,
};
use crate::domain::ports::{
    CheckpointSink, ContextStore, Generator, Planner, ProjectProfile, ResourceProbe,
    RunStateStore, Verifier,
};

use super::admission::AdmissionController;
use super::fix_applier::FixApplier;
use super::repair_engine::RepairEngine;
use super::task_builder::TaskBuilder;
use super::wave_scheduler::{AbortHandle, ScheduleSummary, SchedulerEvent, WaveScheduler};
use super::workspace::ProjectWorkspace;

/// Outcome of a build, resume or verify run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub project: String,
    /// Absent for a bare verify.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSummary>,
    /// The first verification of this run.
    pub verification: VerificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairReport>,
}

impl BuildReport {
    /// Whether the project verifies at the end of the run.
    pub fn is_success(&self) -> bool {
        self.verification.is_success()
            || self.repair.as_ref().is_some_and(RepairReport::is_success)
    }
}

/// Persists the completed set into the run state after every wave.
struct StoreCheckpoint {
    store: Arc<dyn RunStateStore>,
    state: Mutex<RunState>,
}

#[async_trait]
impl CheckpointSink for StoreCheckpoint {
    async fn checkpoint(&self, completed: &BTreeSet<String>) -> Result<(), RunStateError> {
        let mut state = self.state.lock().await;
        state.completed.clone_from(completed);
        state.touch();
        self.store.save(&state).await
    }
}

/// Adapters the pipeline drives.
#[derive(Clone)]
pub struct PipelineAdapters {
    pub generator: Arc<dyn Generator>,
    pub verifier: Arc<dyn Verifier>,
    pub context_store: Arc<dyn ContextStore>,
    pub probe: Arc<dyn ResourceProbe>,
    pub store: Arc<dyn RunStateStore>,
}

pub struct BuildPipeline {
    config: Config,
    root: PathBuf,
    adapters: PipelineAdapters,
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
    abort: AbortHandle,
}

impl BuildPipeline {
    /// Pipeline rooted at the project directory `root`.
    pub fn new(config: Config, root: impl Into<PathBuf>, adapters: PipelineAdapters) -> Self {
        Self {
            config,
            root: root.into(),
            adapters,
            event_tx: None,
            abort: AbortHandle::new(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Handle that stops the run between waves.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ask `planner` for a plan and validate its graph.
    pub async fn plan(planner: &dyn Planner, intent: &str) -> Result<ProjectPlan, PlannerError> {
        let plan = planner.plan(intent).await?;
        plan.graph.validate()?;
        info!(project = %plan.name, tasks = plan.graph.len(), "plan ready");
        Ok(plan)
    }

    /// Build `plan` from scratch.
    #[instrument(skip_all, fields(project = %plan.name, tasks = plan.graph.len()))]
    pub async fn build(&self, plan: ProjectPlan) -> Result<BuildReport, PipelineError> {
        let graph = ValidatedGraph::new(plan.graph.clone())?;
        tokio::fs::create_dir_all(&self.root).await?;

        let state = RunState::new(plan);
        self.adapters.store.save(&state).await?;
        self.execute(state, &graph, ExecutionState::new()).await
    }

    /// Continue a persisted run from its completed set.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub async fn resume(&self) -> Result<BuildReport, PipelineError> {
        let state = self.adapters.store.load().await?;
        let graph = ValidatedGraph::new(state.plan.graph.clone())?;
        let execution = ExecutionState::resumed(
            state
                .completed
                .iter()
                .filter(|id| graph.contains(id))
                .cloned(),
        );
        info!(
            completed = execution.completed().len(),
            total = graph.len(),
            "resuming run"
        );
        self.execute(state, &graph, execution).await
    }

    /// Verify the persisted project, optionally repairing it.
    #[instrument(skip_all, fields(root = %self.root.display(), repair = repair))]
    pub async fn verify(&self, repair: bool) -> Result<BuildReport, PipelineError> {
        let mut state = self.adapters.store.load().await?;
        let (verification, report) = self.verify_and_repair(&mut state, repair).await;
        state.touch();
        self.adapters.store.save(&state).await?;

        Ok(BuildReport {
            project: state.plan.name,
            schedule: None,
            verification,
            repair: report,
        })
    }

    async fn execute(
        &self,
        state: RunState,
        graph: &ValidatedGraph,
        execution: ExecutionState,
    ) -> Result<BuildReport, PipelineError> {
        let profile = ProjectProfile::from(&state.plan);
        let workspace = ProjectWorkspace::new(&self.root);

        let admission = AdmissionController::new(
            self.config.resources.bounds,
            Arc::clone(&self.adapters.probe),
        );
        let monitor = admission.start(Duration::from_millis(
            self.config.resources.check_interval_ms.max(1),
        ));

        let context_results = if self.config.context.enabled {
            self.config.context.results
        } else {
            0
        };
        let builder = TaskBuilder::new(
            Arc::clone(&self.adapters.generator),
            Arc::clone(&self.adapters.context_store),
            workspace,
            profile,
        )
        .with_policy(self.config.scheduler.missing_outputs)
        .with_context_results(context_results)
        .with_task_timeout(Duration::from_secs(self.config.scheduler.task_timeout_secs));

        let checkpoint = Arc::new(StoreCheckpoint {
            store: Arc::clone(&self.adapters.store),
            state: Mutex::new(state),
        });

        let mut scheduler =
            WaveScheduler::new(builder, admission.clone()).with_abort_handle(self.abort.clone());
        if self.config.scheduler.checkpoint {
            scheduler = scheduler.with_checkpoint(Arc::clone(&checkpoint) as Arc<dyn CheckpointSink>);
        }
        if let Some(tx) = &self.event_tx {
            scheduler = scheduler.with_events(tx.clone());
        }

        let result = scheduler.run(graph, execution).await;
        admission.shutdown();
        if let Err(e) = monitor.await {
            warn!(error = %e, "admission monitor ended abnormally");
        }
        let schedule = result?;

        let mut state = checkpoint.state.lock().await.clone();
        state.completed.clone_from(&schedule.completed);

        let (verification, repair) = self
            .verify_and_repair(&mut state, self.config.repair.enabled)
            .await;
        state.touch();
        self.adapters.store.save(&state).await?;

        Ok(BuildReport {
            project: state.plan.name,
            schedule: Some(schedule),
            verification,
            repair,
        })
    }

    async fn verify_and_repair(
        &self,
        state: &mut RunState,
        repair: bool,
    ) -> (VerificationResult, Option<RepairReport>) {
        let verification = self.adapters.verifier.verify(&self.root).await;
        state.last_verification = Some(verification.clone());
        info!(result = %verification.summary(), "verification finished");

        if verification.is_success() || !repair {
            return (verification, None);
        }

        let engine = RepairEngine::new(
            Arc::clone(&self.adapters.generator),
            Arc::clone(&self.adapters.verifier),
            FixApplier::new(
                ProjectWorkspace::new(&self.root),
                Duration::from_secs(self.config.repair.command_timeout_secs),
            ),
            ProjectProfile::from(&state.plan),
        )
        .with_graph(state.plan.graph.clone())
        .with_manifest_files(self.config.repair.manifest_files.clone())
        .with_max_file_chars(self.config.repair.max_file_chars);

        let report = engine.repair(verification.clone()).await;
        state.repair_history = report.history.clone();
        state.last_verification = match (&report.final_error, report.history.last()) {
            (Some(err), _) => Some(err.clone()),
            (None, Some(last)) => last.verification.clone(),
            (None, None) => state.last_verification.take(),
        };
        (verification, Some(report))
    }
}
