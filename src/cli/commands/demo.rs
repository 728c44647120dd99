//! Implementation of the `wavesmith demo` command.
//!
//! Runs the full pipeline without network access: a scripted generator
//! writes every file, verification fails until a marker file exists, and
//! the repair ladder escalates until a strategy creates it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::mock::{FixedProbe, MarkerVerifier, ScriptedGenerator};
use crate::adapters::{InMemoryContextStore, JsonRunStateStore};
use crate::cli::output::{output, ReportOutput};
use crate::cli::ReportedFailure;
use crate::domain::models::{Config, FileFix, FixPlan, ProjectPlan, Strategy, Task, TaskGraph};
use crate::services::{BuildPipeline, PipelineAdapters};

use super::{finish_progress, with_progress};

/// File the demo verifier waits for.
pub const DEMO_MARKER: &str = "app/ready.py";

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Directory the demo project is generated into
    #[arg(long, short, default_value = "wavesmith-demo", value_name = "DIR")]
    pub out: PathBuf,
}

/// Three-task plan the demo builds.
pub fn demo_plan() -> ProjectPlan {
    let graph = TaskGraph::new(vec![
        Task::new("models", "Data models for notes").with_outputs(["app/models.py"]),
        Task::new("api", "HTTP routes for notes")
            .with_outputs(["app/main.py", "app/routes.py"])
            .with_dependencies(["models"]),
        Task::new("tests", "API tests")
            .with_outputs(["tests/test_api.py"])
            .with_dependencies(["api"]),
        Task::new("docs", "Project readme").with_outputs(["README.md"]),
    ]);
    ProjectPlan::new("notes-demo", graph)
        .with_stack(["python", "fastapi"])
        .with_features(["create notes", "list notes"])
}

/// S0 rewrites the wrong file, S1 errors out, S2 creates the marker.
pub fn demo_generator() -> ScriptedGenerator {
    ScriptedGenerator::echo()
        .with_fix(
            Strategy::QuickFixes,
            FixPlan::new()
                .with_summary("import error", "models module incomplete")
                .with_fix(FileFix::new(
                    "app/models.py",
                    "class Note:\n    pass\n",
                    "define the Note model",
                )),
        )
        .with_fix_error(Strategy::LogicFixes, "model unavailable")
        .with_fix(
            Strategy::TestConfig,
            FixPlan::new()
                .with_summary("missing module", "test setup imports app.ready")
                .with_fix(FileFix::new(DEMO_MARKER, "READY = True\n", "add the readiness module"))
                .with_command("echo ready"),
        )
}

/// Offline adapters for the demo run in `root`.
pub fn demo_adapters(root: &std::path::Path) -> PipelineAdapters {
    PipelineAdapters {
        generator: Arc::new(demo_generator()),
        verifier: Arc::new(MarkerVerifier::new(DEMO_MARKER)),
        context_store: Arc::new(InMemoryContextStore::default()),
        probe: Arc::new(FixedProbe::idle()),
        store: Arc::new(JsonRunStateStore::for_project(root)),
    }
}

/// Build the demo project with scripted adapters.
pub async fn execute(args: DemoArgs, mut config: Config, json_mode: bool) -> Result<()> {
    config.repair.enabled = true;
    config.scheduler.checkpoint = true;

    let adapters = demo_adapters(&args.out);
    let (pipeline, progress) =
        with_progress(BuildPipeline::new(config, &args.out, adapters), json_mode);

    let result = pipeline.build(demo_plan()).await;
    drop(pipeline);
    finish_progress(progress).await;

    let report = result.context("Demo build failed")?;
    let output_data = ReportOutput::new(&args.out, report);
    output(&output_data, json_mode);
    if !output_data.success {
        return Err(ReportedFailure.into());
    }
    Ok(())
}
