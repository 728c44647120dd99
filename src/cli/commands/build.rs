//! Implementation of the `wavesmith build` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::adapters::LlmPlanner;
use crate::cli::output::{output, ReportOutput};
use crate::cli::ReportedFailure;
use crate::domain::models::{Config, ProjectPlan};
use crate::services::BuildPipeline;

use super::{abort_on_ctrl_c, finish_progress, live_adapters, load_plan, with_progress};

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["plan", "intent"])))]
pub struct BuildArgs {
    /// Project plan file (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Describe the project and let the planner produce the plan
    #[arg(long, value_name = "TEXT")]
    pub intent: Option<String>,

    /// Directory the project is generated into
    #[arg(long, short, value_name = "DIR")]
    pub out: PathBuf,
}

async fn resolve_plan(args: &BuildArgs, config: &Config) -> Result<ProjectPlan> {
    if let Some(path) = &args.plan {
        let plan = load_plan(path).await?;
        plan.graph
            .validate()
            .with_context(|| format!("Plan {} has an invalid task graph", path.display()))?;
        return Ok(plan);
    }

    let intent = args.intent.as_deref().unwrap_or_default();
    let planner = LlmPlanner::from_config(&config.generator).context("Failed to create planner")?;
    let plan = BuildPipeline::plan(&planner, intent)
        .await
        .context("Planning failed")?;
    Ok(plan)
}

/// Plan, build and verify a project.
pub async fn execute(args: BuildArgs, config: Config, json_mode: bool) -> Result<()> {
    let plan = resolve_plan(&args, &config).await?;
    info!(project = %plan.name, tasks = plan.graph.len(), out = %args.out.display(), "starting build");

    let adapters = live_adapters(&config, &plan.tech_stack, &args.out)?;
    let (pipeline, progress) =
        with_progress(BuildPipeline::new(config, &args.out, adapters), json_mode);
    let interrupt = abort_on_ctrl_c(&pipeline);

    let result = pipeline.build(plan).await;
    interrupt.abort();
    drop(pipeline);
    finish_progress(progress).await;

    let report = result.context("Build failed")?;
    let output_data = ReportOutput::new(&args.out, report);
    output(&output_data, json_mode);
    if !output_data.success {
        return Err(ReportedFailure.into());
    }
    Ok(())
}
