//! Implementation of the `wavesmith status` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use serde::Serialize;

use crate::cli::output::table::{repair_table, tasks_table};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{RunState, ValidatedGraph};

use super::load_state;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project directory of an earlier build
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub project: String,
    pub tech_stack: Vec<String>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Ids whose dependencies are all completed.
    pub ready: Vec<String>,
    pub verification: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    state: RunState,
}

impl StatusOutput {
    /// Summarize a saved run.
    pub fn from_state(state: RunState) -> Self {
        let ready = ValidatedGraph::new(state.plan.graph.clone())
            .map(|g| {
                g.ready_set(&state.completed)
                    .into_iter()
                    .map(|t| t.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            project: state.plan.name.clone(),
            tech_stack: state.plan.tech_stack.clone(),
            total_tasks: state.plan.graph.len(),
            completed_tasks: state.completed.len(),
            ready,
            verification: state.last_verification.as_ref().map(|v| v.summary()),
            updated_at: state.updated_at,
            state,
        }
    }
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{} {}", style("Project").bold(), style(&self.project).cyan()),
            format!("Stack:     {}", self.tech_stack.join(", ")),
            format!("Progress:  {}/{} tasks", self.completed_tasks, self.total_tasks),
            format!("Updated:   {}", self.updated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ];
        if !self.ready.is_empty() {
            lines.push(format!("Ready:     {}", self.ready.join(", ")));
        }
        let verification = match &self.verification {
            Some(summary) if summary == "passed" => style(summary.as_str()).green().to_string(),
            Some(summary) => style(summary.as_str()).red().to_string(),
            None => style("not run").dim().to_string(),
        };
        lines.push(format!("Verify:    {verification}"));
        lines.push(String::new());
        lines.push(tasks_table(&self.state).to_string());

        if !self.state.repair_history.is_empty() {
            lines.push(String::new());
            lines.push(style("Repair history").bold().to_string());
            lines.push(repair_table(&self.state.repair_history).to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "completed".into(),
                serde_json::to_value(&self.state.completed).unwrap_or_default(),
            );
            map.insert(
                "repair_history".into(),
                serde_json::to_value(&self.state.repair_history).unwrap_or_default(),
            );
        }
        value
    }
}

/// Show the saved run state.
pub async fn execute(args: StatusArgs, json_mode: bool) -> Result<()> {
    let state = load_state(&args.dir).await?;
    output(&StatusOutput::from_state(state), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ProjectPlan, Task, TaskGraph, VerificationResult};

    fn state() -> RunState {
        let graph = TaskGraph::new(vec![
            Task::new("a", "first").with_outputs(["a.py"]),
            Task::new("b", "second").with_dependencies(["a"]),
            Task::new("c", "third").with_dependencies(["b"]),
        ]);
        let mut state = RunState::new(ProjectPlan::new("demo", graph).with_stack(["python"]));
        state.completed.insert("a".into());
        state.last_verification = Some(VerificationResult::failed("pytest", 1, "", "boom"));
        state
    }

    #[test]
    fn test_status_counts_and_ready_set() {
        let status = StatusOutput::from_state(state());
        assert_eq!(status.total_tasks, 3);
        assert_eq!(status.completed_tasks, 1);
        assert_eq!(status.ready, vec!["b"]);
        assert_eq!(status.verification.as_deref(), Some("`pytest` exited with 1: boom"));
    }

    #[test]
    fn test_status_json_includes_completed() {
        let json = StatusOutput::from_state(state()).to_json();
        assert_eq!(json["project"], "demo");
        assert_eq!(json["completed"], serde_json::json!(["a"]));
        assert!(json["repair_history"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_reads_persisted_state() {
        use crate::adapters::JsonRunStateStore;
        use crate::domain::ports::RunStateStore;

        let dir = tempfile::tempdir().unwrap();
        JsonRunStateStore::for_project(dir.path())
            .save(&state())
            .await
            .unwrap();
        execute(
            StatusArgs {
                dir: dir.path().to_path_buf(),
            },
            true,
        )
        .await
        .unwrap();
    }
}
