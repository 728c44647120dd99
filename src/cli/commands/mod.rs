//! CLI command implementations.

pub mod build;
pub mod demo;
pub mod init;
pub mod resume;
pub mod status;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::adapters::{
    CommandVerifier, InMemoryContextStore, JsonRunStateStore, LlmGenerator, SysinfoProbe,
};
use crate::domain::models::{Config, ProjectPlan, RunState};
use crate::domain::ports::{ContextStore, NullContextStore, RunStateStore};
use crate::services::{BuildPipeline, PipelineAdapters};

use super::output::progress::{WaveProgress, EVENT_BUFFER};

/// Read a project plan from a YAML or JSON file.
pub async fn load_plan(path: &Path) -> Result<ProjectPlan> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read plan {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let plan: ProjectPlan = if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON plan {}", path.display()))?
    } else {
        serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid YAML plan {}", path.display()))?
    };
    Ok(plan)
}

/// Load the run state persisted under `root`.
pub async fn load_state(root: &Path) -> Result<RunState> {
    JsonRunStateStore::for_project(root)
        .load()
        .await
        .with_context(|| format!("No build state found under {}", root.display()))
}

/// Production adapters: LLM generator, stack-derived verifier, system probe,
/// JSON state file under `root`.
pub fn live_adapters(config: &Config, tech_stack: &[String], root: &Path) -> Result<PipelineAdapters> {
    let generator =
        LlmGenerator::from_config(&config.generator).context("Failed to create generator")?;

    let verifier = CommandVerifier::from_config(&config.verification, tech_stack);

    let context_store: Arc<dyn ContextStore> = if config.context.enabled {
        Arc::new(InMemoryContextStore::from_config(&config.context))
    } else {
        Arc::new(NullContextStore)
    };

    Ok(PipelineAdapters {
        generator: Arc::new(generator),
        verifier: Arc::new(verifier),
        context_store,
        probe: Arc::new(SysinfoProbe::new()),
        store: Arc::new(JsonRunStateStore::for_project(root)),
    })
}

/// Attach a progress bar unless output is JSON. The returned handle
/// finishes once the pipeline (and with it the event sender) is dropped.
pub fn with_progress(
    pipeline: BuildPipeline,
    json_mode: bool,
) -> (BuildPipeline, Option<JoinHandle<WaveProgress>>) {
    if json_mode {
        return (pipeline, None);
    }
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let handle = WaveProgress::new().spawn(rx);
    (pipeline.with_events(tx), Some(handle))
}

/// Stop scheduling further waves on Ctrl-C. Running tasks finish first.
pub fn abort_on_ctrl_c(pipeline: &BuildPipeline) -> JoinHandle<()> {
    let abort = pipeline.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current wave");
            abort.abort();
        }
    })
}

/// Wait for the progress display to drain.
pub async fn finish_progress(handle: Option<JoinHandle<WaveProgress>>) {
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "progress display ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_plan_yaml_with_planner_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(
            &path,
            r"
project_name: notes
tech_stack: [python]
execution_plan:
  - task_id: models
    task_description: data models
    output_files: [app/models.py]
  - task_id: api
    task_description: routes
    output_files: [app/main.py]
    depends_on: [models]
",
        )
        .unwrap();

        let plan = load_plan(&path).await.unwrap();
        assert_eq!(plan.name, "notes");
        assert_eq!(plan.graph.len(), 2);
        assert!(plan.graph.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_plan_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"{"name": "x", "graph": [{"id": "a", "description": "d", "output_paths": ["a.txt"]}]}"#,
        )
        .unwrap();

        let plan = load_plan(&path).await.unwrap();
        assert_eq!(plan.graph.tasks()[0].id, "a");
    }

    #[tokio::test]
    async fn test_load_state_missing_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_state(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("No build state found"));
    }

    #[test]
    fn test_live_adapters_without_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        temp_env::with_var(&config.generator.api_key_env, None::<&str>, || {
            assert!(live_adapters(&config, &["python".to_string()], dir.path()).is_ok());
        });
    }
}
