//! Implementation of the `wavesmith verify` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, ReportOutput};
use crate::cli::ReportedFailure;
use crate::domain::models::Config;
use crate::services::BuildPipeline;

use super::{live_adapters, load_state};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Project directory of an earlier build
    pub dir: PathBuf,

    /// Run the repair strategies if verification fails
    #[arg(long)]
    pub repair: bool,
}

/// Run verification, repairing on failure unless disabled.
pub async fn execute(args: VerifyArgs, config: Config, json_mode: bool) -> Result<()> {
    let state = load_state(&args.dir).await?;
    let adapters = live_adapters(&config, &state.plan.tech_stack, &args.dir)?;
    let pipeline = BuildPipeline::new(config, &args.dir, adapters);

    let report = pipeline
        .verify(args.repair)
        .await
        .context("Verification failed to run")?;

    let output_data = ReportOutput::new(&args.dir, report);
    output(&output_data, json_mode);
    if !output_data.success {
        return Err(ReportedFailure.into());
    }
    Ok(())
}
