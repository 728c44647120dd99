//! Command-line interface.
//!
//! `clap` derive definitions, per-command handlers and terminal output.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::build::BuildArgs;
use commands::demo::DemoArgs;
use commands::init::InitArgs;
use commands::resume::ResumeArgs;
use commands::status::StatusArgs;
use commands::verify::VerifyArgs;

#[derive(Parser, Debug)]
#[command(name = "wavesmith")]
#[command(about = "Wavesmith - wave-scheduled project builds with self-repair", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Load configuration from this file instead of .wavesmith/
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default .wavesmith/config.yaml
    Init(InitArgs),

    /// Generate a project from a plan file or an intent
    Build(BuildArgs),

    /// Continue an interrupted build
    Resume(ResumeArgs),

    /// Verify a built project, optionally repairing it
    Verify(VerifyArgs),

    /// Show persisted run state and repair history
    Status(StatusArgs),

    /// Run the whole pipeline offline with scripted adapters
    Demo(DemoArgs),
}

/// A failure whose details were already printed as the command's output.
#[derive(Debug, thiserror::Error)]
#[error("project did not pass verification")]
pub struct ReportedFailure;

/// Print `err` and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if err.is::<ReportedFailure>() {
        std::process::exit(1);
    }
    if json {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", console::style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", console::style("caused by:").dim());
        }
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_with_plan() {
        let cli = Cli::try_parse_from([
            "wavesmith", "--json", "build", "--plan", "plan.yaml", "--out", "out",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.plan, Some(PathBuf::from("plan.yaml")));
                assert_eq!(args.out, PathBuf::from("out"));
                assert!(args.intent.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_plan_and_intent_conflict() {
        let err = Cli::try_parse_from([
            "wavesmith", "build", "--plan", "p.yaml", "--intent", "x", "--out", "o",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_build_requires_a_source() {
        assert!(Cli::try_parse_from(["wavesmith", "build", "--out", "o"]).is_err());
    }

    #[test]
    fn test_verify_repair_flag() {
        let cli = Cli::try_parse_from(["wavesmith", "verify", "proj", "--repair"]).unwrap();
        match cli.command {
            Commands::Verify(args) => {
                assert!(args.repair);
                assert_eq!(args.dir, PathBuf::from("proj"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
