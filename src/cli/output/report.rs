//! Rendering of build, resume and verify reports.

use std::fmt::Write as _;
use std::path::PathBuf;

use console::style;
use serde::Serialize;

use crate::domain::models::{AttemptOutcome, VerificationResult};
use crate::services::BuildReport;

use super::{first_line, truncate, CommandOutput};

#[derive(Debug, Serialize)]
pub struct ReportOutput {
    pub success: bool,
    pub root: PathBuf,
    #[serde(flatten)]
    pub report: BuildReport,
}

impl ReportOutput {
    /// Report for a run in `root`.
    pub fn new(root: impl Into<PathBuf>, report: BuildReport) -> Self {
        Self {
            success: report.is_success(),
            root: root.into(),
            report,
        }
    }
}

fn describe_verification(result: &VerificationResult) -> String {
    if result.is_success() {
        return style("passed").green().bold().to_string();
    }
    let detail = if result.stderr.trim().is_empty() {
        first_line(&result.stdout)
    } else {
        first_line(&result.stderr)
    };
    format!(
        "{} ({}) {}",
        style("failed").red().bold(),
        result.command.as_deref().unwrap_or("unknown command"),
        truncate(detail, 100)
    )
}

impl CommandOutput for ReportOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        let mut out = format!(
            "{} {}\n",
            style("Project").bold(),
            style(&report.project).cyan()
        );
        let _ = writeln!(out, "  root:          {}", self.root.display());

        if let Some(schedule) = &report.schedule {
            let _ = writeln!(
                out,
                "  generated:     {} task(s) in {} wave(s), {} ms",
                schedule.completed.len(),
                schedule.waves.len(),
                schedule.duration_ms
            );
            let shortfalls: Vec<_> = schedule.shortfalls().collect();
            if !shortfalls.is_empty() {
                let _ = writeln!(out, "  shortfalls:");
                for outcome in shortfalls {
                    let _ = writeln!(
                        out,
                        "    - {}: placeholders [{}], missing [{}]",
                        outcome.task_id,
                        outcome.placeholders.join(", "),
                        outcome.missing.join(", ")
                    );
                }
            }
        }

        let _ = writeln!(
            out,
            "  verification:  {}",
            describe_verification(&report.verification)
        );

        if let Some(repair) = &report.repair {
            for attempt in repair.history.records() {
                let outcome = match attempt.outcome {
                    AttemptOutcome::Success => style("success").green().to_string(),
                    AttemptOutcome::NoFixProposed => style("no fix").yellow().to_string(),
                    AttemptOutcome::FixAppliedFailed => style("still failing").red().to_string(),
                };
                let _ = writeln!(
                    out,
                    "    #{} S{} {:<32} {outcome}",
                    attempt.attempt_number,
                    attempt.strategy.index(),
                    attempt.strategy.label()
                );
            }
            let verdict = match repair.strategy_used {
                Some(strategy) if repair.is_success() => style(format!(
                    "repaired by {strategy} after {} attempt(s)",
                    repair.attempts
                ))
                .green()
                .to_string(),
                _ => style(format!("exhausted after {} attempt(s)", repair.attempts))
                    .red()
                    .to_string(),
            };
            let _ = writeln!(out, "  repair:        {verdict}");
        }

        let status = if self.success {
            style("SUCCESS").green().bold()
        } else {
            style("FAILED").red().bold()
        };
        let _ = write!(out, "\n{status}");
        out
    }
}
