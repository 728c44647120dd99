//! Wave scheduler: runs a validated task graph wave by wave.
//!
//! Each iteration computes the ready set (incomplete tasks whose dependencies
//! are all complete), runs every ready task concurrently under the admission
//! controller, waits for the whole wave, then marks the wave's tasks complete.
//! An empty ready set with work remaining is a deadlock.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::domain::errors::SchedulerError;
use crate::domain::models::{CompletionRecord, ExecutionState, Task, ValidatedGraph};
use crate::domain::ports::CheckpointSink;

use super::admission::AdmissionController;
use super::task_builder::{TaskBuilder, TaskOutcome};

/// Event emitted during a scheduling run.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Started {
        total_tasks: usize,
        already_completed: usize,
    },
    WaveStarted {
        wave: usize,
        task_ids: Vec<String>,
    },
    TaskStarted {
        task_id: String,
    },
    TaskCompleted {
        task_id: String,
        outcome: TaskOutcome,
    },
    WaveCompleted {
        wave: usize,
        completed_total: usize,
    },
    Finished {
        waves: usize,
        completed_total: usize,
    },
}

/// Shared flag checked between waves. Running tasks are never interrupted.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Handle in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop before the next wave.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether `abort` has been called.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Result of a completed scheduling run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleSummary {
    /// Task ids per wave executed in this run.
    pub waves: Vec<Vec<String>>,
    pub completed: BTreeSet<String>,
    pub outcomes: Vec<TaskOutcome>,
    pub completion_log: Vec<CompletionRecord>,
    pub duration_ms: u64,
}

impl ScheduleSummary {
    /// Tasks whose declared outputs were not all generated.
    pub fn shortfalls(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_complete())
    }
}

pub struct WaveScheduler {
    builder: TaskBuilder,
    admission: AdmissionController,
    checkpoint: Option<Arc<dyn CheckpointSink>>,
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
    abort: AbortHandle,
}

impl WaveScheduler {
    /// Scheduler building tasks with `builder`, paced by `admission`.
    pub fn new(builder: TaskBuilder, admission: AdmissionController) -> Self {
        Self {
            builder,
            admission,
            checkpoint: None,
            event_tx: None,
            abort: AbortHandle::new(),
        }
    }

    /// Persist the completed set after every wave.
    #[must_use]
    pub fn with_checkpoint(mut self, sink: Arc<dyn CheckpointSink>) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    #[must_use]
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Handle that stops this scheduler between waves.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    async fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run until every task is complete.
    ///
    /// `state` may carry ids completed by an earlier run; those tasks are
    /// not rebuilt.
    #[instrument(skip_all, fields(tasks = graph.len(), resumed = state.completed().len()))]
    pub async fn run(
        &self,
        graph: &ValidatedGraph,
        mut state: ExecutionState,
    ) -> Result<ScheduleSummary, SchedulerError> {
        let started = Instant::now();
        let mut summary = ScheduleSummary::default();

        self.emit(SchedulerEvent::Started {
            total_tasks: graph.len(),
            already_completed: state.completed().len(),
        })
        .await;

        let mut wave = 0usize;
        loop {
            if self.abort.is_aborted() {
                warn!(completed = state.completed().len(), "run aborted");
                return Err(SchedulerError::Aborted {
                    completed: state.completed().clone(),
                });
            }

            if graph.is_complete(state.completed()) {
                break;
            }

            let ready: Vec<Task> = graph
                .ready_set(state.completed())
                .into_iter()
                .cloned()
                .collect();
            if ready.is_empty() {
                let remaining = graph.remaining(state.completed());
                error!(remaining = ?remaining, "no ready tasks but work remains");
                return Err(SchedulerError::Deadlock { remaining });
            }

            wave += 1;
            let task_ids: Vec<String> = ready.iter().map(|t| t.id.clone()).collect();
            info!(
                wave,
                tasks = task_ids.len(),
                limit = self.admission.limit(),
                "wave started"
            );
            self.emit(SchedulerEvent::WaveStarted {
                wave,
                task_ids: task_ids.clone(),
            })
            .await;

            let results = self.run_wave(ready).await;

            let mut first_error = None;
            for (task_id, result) in results {
                match result {
                    Ok(outcome) => {
                        state.mark_completed(&task_id, wave);
                        self.emit(SchedulerEvent::TaskCompleted {
                            task_id,
                            outcome: outcome.clone(),
                        })
                        .await;
                        summary.outcomes.push(outcome);
                    }
                    Err(err) => {
                        error!(task_id = %task_id, error = %err, "task failed");
                        first_error.get_or_insert(err);
                    }
                }
            }

            summary.waves.push(task_ids);
            if let Some(sink) = &self.checkpoint {
                sink.checkpoint(state.completed()).await?;
            }
            if let Some(err) = first_error {
                return Err(err);
            }

            info!(wave, completed = state.completed().len(), "wave completed");
            self.emit(SchedulerEvent::WaveCompleted {
                wave,
                completed_total: state.completed().len(),
            })
            .await;
        }

        summary.completed = state.completed().clone();
        summary.completion_log = state.log().to_vec();
        summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            waves = summary.waves.len(),
            completed = summary.completed.len(),
            duration_ms = summary.duration_ms,
            "schedule finished"
        );
        self.emit(SchedulerEvent::Finished {
            waves: summary.waves.len(),
            completed_total: summary.completed.len(),
        })
        .await;

        Ok(summary)
    }

    /// Run one wave to completion. Results come back in ready-set order.
    async fn run_wave(&self, ready: Vec<Task>) -> Vec<(String, Result<TaskOutcome, SchedulerError>)> {
        let mut ids = Vec::with_capacity(ready.len());
        let mut handles = Vec::with_capacity(ready.len());

        for task in ready {
            ids.push(task.id.clone());
            let builder = self.builder.clone();
            let admission = self.admission.clone();
            let event_tx = self.event_tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = admission.admit().await;
                if let Some(tx) = &event_tx {
                    let _ = tx
                        .send(SchedulerEvent::TaskStarted {
                            task_id: task.id.clone(),
                        })
                        .await;
                }
                builder.build(&task).await
            }));
        }

        join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, task_id)| {
                let result = joined.unwrap_or_else(|e| {
                    Err(SchedulerError::TaskJoin {
                        task: task_id.clone(),
                        reason: e.to_string(),
                    })
                });
                (task_id, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{FixedProbe, ScriptedGenerator};
    use crate::domain::models::{ConcurrencyBounds, TaskGraph};
    use crate::domain::ports::{NullContextStore, ProjectProfile};
    use crate::services::workspace::ProjectWorkspace;

    fn scheduler(root: &std::path::Path, generator: ScriptedGenerator) -> WaveScheduler {
        let builder = TaskBuilder::new(
            Arc::new(generator),
            Arc::new(NullContextStore::new()),
            ProjectWorkspace::new(root),
            ProjectProfile::default(),
        );
        let admission = AdmissionController::new(
            ConcurrencyBounds::with_workers(1, 4),
            Arc::new(FixedProbe::idle()),
        );
        WaveScheduler::new(builder, admission)
    }

    fn graph(tasks: Vec<Task>) -> ValidatedGraph {
        ValidatedGraph::new(TaskGraph::new(tasks)).unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_runs_in_two_waves() {
        let dir = tempfile::tempdir().unwrap();
        let g = graph(vec![
            Task::new("a", "").with_outputs(["a.txt"]),
            Task::new("b", "").with_outputs(["b.txt"]).with_dependencies(["a"]),
            Task::new("c", "").with_outputs(["c.txt"]).with_dependencies(["a"]),
        ]);

        let summary = scheduler(dir.path(), ScriptedGenerator::echo())
            .run(&g, ExecutionState::new())
            .await
            .unwrap();

        assert_eq!(
            summary.waves,
            vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]
        );
        assert_eq!(summary.completed, g.all_ids());
        assert!(dir.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_resume_skips_completed_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let g = graph(vec![
            Task::new("a", "").with_outputs(["a.txt"]),
            Task::new("b", "").with_outputs(["b.txt"]).with_dependencies(["a"]),
        ]);

        let summary = scheduler(dir.path(), ScriptedGenerator::echo())
            .run(&g, ExecutionState::resumed(["a"]))
            .await
            .unwrap();

        assert_eq!(summary.waves, vec![vec!["b".to_string()]]);
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(summary.completion_log.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_before_first_wave() {
        let dir = tempfile::tempdir().unwrap();
        let g = graph(vec![Task::new("a", "").with_outputs(["a.txt"])]);
        let sched = scheduler(dir.path(), ScriptedGenerator::echo());
        sched.abort_handle().abort();

        let err = sched.run(&g, ExecutionState::new()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Aborted { ref completed } if completed.is_empty()));
    }

    #[tokio::test]
    async fn test_completed_graph_runs_no_waves() {
        let dir = tempfile::tempdir().unwrap();
        let g = graph(vec![Task::new("a", "")]);
        let summary = scheduler(dir.path(), ScriptedGenerator::echo())
            .run(&g, ExecutionState::resumed(["a"]))
            .await
            .unwrap();
        assert!(summary.waves.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let g = graph(vec![Task::new("a", "").with_outputs(["a.txt"])]);
        let (tx, mut rx) = mpsc::channel(32);

        scheduler(dir.path(), ScriptedGenerator::echo())
            .with_events(tx)
            .run(&g, ExecutionState::new())
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                SchedulerEvent::Started { .. } => "started",
                SchedulerEvent::WaveStarted { .. } => "wave_started",
                SchedulerEvent::TaskStarted { .. } => "task_started",
                SchedulerEvent::TaskCompleted { .. } => "task_completed",
                SchedulerEvent::WaveCompleted { .. } => "wave_completed",
                SchedulerEvent::Finished { .. } => "finished",
            });
        }
        assert_eq!(
            kinds,
            vec!["started", "wave_started", "task_started", "task_completed", "wave_completed", "finished"]
        );
    }
}
