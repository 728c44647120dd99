//! Applies fix plans to a project workspace.
//!
//! Layers run in order (dependencies, config, code). Within a layer every
//! file fix is written first, then the layer's commands run in order.
//! Command failures are recorded and otherwise ignored. Applied fixes are
//! never rolled back.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::domain::models::{truncate_output, ApplyReport, CommandRecord, FixPlan};
use crate::infrastructure::process::{run_shell, ShellOutcome};

use super::workspace::ProjectWorkspace;

const COMMAND_OUTPUT_LIMIT: usize = 1500;

#[derive(Debug, Clone)]
pub struct FixApplier {
    workspace: ProjectWorkspace,
    command_timeout: Duration,
}

impl FixApplier {
    /// Applier writing into `workspace`; each fix command gets `command_timeout`.
    pub fn new(workspace: ProjectWorkspace, command_timeout: Duration) -> Self {
        Self {
            workspace,
            command_timeout,
        }
    }

    /// Workspace fixes are written into.
    pub fn workspace(&self) -> &ProjectWorkspace {
        &self.workspace
    }

    #[instrument(skip_all, fields(layers = plan.ordered_layers().len()))]
    pub async fn apply(&self, plan: &FixPlan) -> ApplyReport {
        let mut report = ApplyReport::default();

        for layer in plan.ordered_layers() {
            for fix in &layer.fixes {
                match self.workspace.write_file(&fix.file_path, &fix.new_content).await {
                    Ok(_) => {
                        info!(path = %fix.file_path, layer = ?layer.kind, reason = %fix.reason, "applied file fix");
                        report.files_written.push(fix.file_path.clone());
                    }
                    Err(err) => {
                        warn!(path = %fix.file_path, error = %err, "skipped file fix");
                        report.skipped.push((fix.file_path.clone(), err.to_string()));
                    }
                }
            }

            for command in &layer.commands {
                report.commands.push(self.run_command(command).await);
            }
        }

        report
    }

    async fn run_command(&self, command: &str) -> CommandRecord {
        let outcome = run_shell(command, self.workspace.root(), self.command_timeout).await;
        let succeeded = outcome.succeeded();
        let record = match outcome {
            ShellOutcome::Exited { code, stdout, stderr } => CommandRecord {
                command: command.to_string(),
                exit_code: code,
                succeeded,
                output: truncate_output(&format!("{stdout}{stderr}"), COMMAND_OUTPUT_LIMIT),
            },
            ShellOutcome::TimedOut => CommandRecord {
                command: command.to_string(),
                exit_code: None,
                succeeded: false,
                output: format!(
                    "Command timed out after {} seconds",
                    self.command_timeout.as_secs()
                ),
            },
            ShellOutcome::SpawnFailed(reason) => CommandRecord {
                command: command.to_string(),
                exit_code: None,
                succeeded: false,
                output: reason,
            },
        };

        if record.succeeded {
            info!(command, "post-fix command succeeded");
        } else {
            warn!(command, exit_code = ?record.exit_code, "post-fix command failed, continuing");
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FileFix, FixLayer, LayerKind};

    fn applier(root: &std::path::Path) -> FixApplier {
        FixApplier::new(ProjectWorkspace::new(root), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "broken(").unwrap();
        let plan = FixPlan::new()
            .with_fix(FileFix::new("app.py", "print('fixed')\n", "syntax"))
            .with_fix(FileFix::new("pkg/__init__.py", "", "missing package"));

        let fixer = applier(dir.path());
        fixer.apply(&plan).await;
        let first = std::fs::read_to_string(dir.path().join("app.py")).unwrap();
        fixer.apply(&plan).await;
        let second = std::fs::read_to_string(dir.path().join("app.py")).unwrap();

        assert_eq!(first, "print('fixed')\n");
        assert_eq!(first, second);
        assert!(dir.path().join("pkg/__init__.py").exists());
    }

    #[tokio::test]
    async fn test_command_failures_do_not_stop_later_steps() {
        let dir = tempfile::tempdir().unwrap();
        let plan = FixPlan::new()
            .with_command("exit 7")
            .with_command("echo done > done.txt");

        let report = applier(dir.path()).apply(&plan).await;
        assert_eq!(report.commands.len(), 2);
        assert_eq!(report.commands[0].exit_code, Some(7));
        assert!(!report.commands[0].succeeded);
        assert!(report.commands[1].succeeded);
        assert_eq!(report.failed_commands(), 1);
        assert!(dir.path().join("done.txt").exists());
    }

    #[tokio::test]
    async fn test_layers_apply_files_before_their_commands_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut deps = FixLayer::new(LayerKind::Dependencies);
        deps.fixes.push(FileFix::new("deps.txt", "1", ""));
        deps.commands.push("cat deps.txt > order.log".into());
        let mut code = FixLayer::new(LayerKind::Code);
        code.fixes.push(FileFix::new("code.txt", "2", ""));
        code.commands.push("cat code.txt >> order.log".into());

        let plan = FixPlan::new().with_layer(code).with_layer(deps);
        let report = applier(dir.path()).apply(&plan).await;

        assert_eq!(report.files_written, vec!["deps.txt", "code.txt"]);
        assert_eq!(std::fs::read_to_string(dir.path().join("order.log")).unwrap(), "12");
    }

    #[tokio::test]
    async fn test_unsafe_fix_path_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let plan = FixPlan::new().with_fix(FileFix::new("../escape.txt", "x", ""));
        let report = applier(dir.path()).apply(&plan).await;
        assert!(report.files_written.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }
}
