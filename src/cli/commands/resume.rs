//! Implementation of the `wavesmith resume` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, ReportOutput};
use crate::cli::ReportedFailure;
use crate::domain::models::Config;
use crate::services::BuildPipeline;

use super::{abort_on_ctrl_c, finish_progress, live_adapters, load_state, with_progress};

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Project directory of an earlier build
    pub dir: PathBuf,
}

/// Continue the saved run.
pub async fn execute(args: ResumeArgs, config: Config, json_mode: bool) -> Result<()> {
    let state = load_state(&args.dir).await?;
    let adapters = live_adapters(&config, &state.plan.tech_stack, &args.dir)?;

    let (pipeline, progress) =
        with_progress(BuildPipeline::new(config, &args.dir, adapters), json_mode);
    let interrupt = abort_on_ctrl_c(&pipeline);

    let result = pipeline.resume().await;
    interrupt.abort();
    drop(pipeline);
    finish_progress(progress).await;

    let report = result.context("Resume failed")?;
    let output_data = ReportOutput::new(&args.dir, report);
    output(&output_data, json_mode);
    if !output_data.success {
        return Err(ReportedFailure.into());
    }
    Ok(())
}
