//! Shell-command verifier.
//!
//! Runs build and test commands in order inside the project root and stops
//! at the first failure. Nothing here returns an error: missing roots,
//! spawn failures and timeouts all become failed results with a synthetic
//! exit code.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::domain::models::verification::SYNTHETIC_EXIT_CODE;
use crate::domain::models::{VerificationConfig, VerificationResult};
use crate::domain::ports::Verifier;
use crate::infrastructure::process::{run_shell, ShellOutcome};

const NPM_BUILD: &[&str] = &["npm install", "npm run build"];
const TSC_CHECK: &[&str] = &["npm install", "npx tsc --noEmit"];
const NPM_TEST: &[&str] = &["npm install", "npm test"];
const PYTHON_TEST: &[&str] = &["pip install -r requirements.txt", "python3 -m pytest"];
const CARGO_TEST: &[&str] = &["cargo build", "cargo test"];
const GO_TEST: &[&str] = &["go build ./...", "go test ./..."];

/// Build/test commands for a tech stack.
///
/// At most one JavaScript family entry applies (the first of nextjs, react,
/// typescript, javascript found); python, rust and go are added on top.
pub fn commands_for_stack(tech_stack: &[String]) -> Vec<String> {
    let stack: Vec<String> = tech_stack.iter().map(|t| t.trim().to_lowercase()).collect();
    let has = |names: &[&str]| stack.iter().any(|t| names.contains(&t.as_str()));

    let mut commands: Vec<&str> = Vec::new();
    if has(&["nextjs", "next.js", "next"]) || has(&["react"]) {
        commands.extend(NPM_BUILD);
    } else if has(&["typescript", "ts"]) {
        commands.extend(TSC_CHECK);
    } else if has(&["javascript", "js", "node", "node.js"]) {
        commands.extend(NPM_TEST);
    }
    if has(&["python", "fastapi", "flask", "django"]) {
        commands.extend(PYTHON_TEST);
    }
    if has(&["rust"]) {
        commands.extend(CARGO_TEST);
    }
    if has(&["go", "golang"]) {
        commands.extend(GO_TEST);
    }

    commands.into_iter().map(String::from).collect()
}

#[derive(Debug, Clone)]
pub struct CommandVerifier {
    commands: Vec<String>,
    timeout: Duration,
    output_limit: usize,
}

impl CommandVerifier {
    /// Verifier running `commands` in order.
    pub fn new(commands: Vec<String>) -> Self {
        let defaults = VerificationConfig::default();
        Self {
            commands,
            timeout: Duration::from_secs(defaults.timeout_secs),
            output_limit: defaults.output_limit,
        }
    }

    /// Use the configured commands, or derive them from `tech_stack` when
    /// none are configured.
    pub fn from_config(config: &VerificationConfig, tech_stack: &[String]) -> Self {
        let commands = if config.commands.is_empty() {
            commands_for_stack(tech_stack)
        } else {
            config.commands.clone()
        };
        Self {
            commands,
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit: config.output_limit,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_output_limit(mut self, output_limit: usize) -> Self {
        self.output_limit = output_limit;
        self
    }

    /// Configured commands.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    #[instrument(skip_all, fields(root = %project_root.display(), commands = self.commands.len()))]
    async fn verify(&self, project_root: &Path) -> VerificationResult {
        if !project_root.is_dir() {
            warn!("project root does not exist");
            return VerificationResult::synthetic_failure(
                "verify",
                format!("Target directory does not exist: {}", project_root.display()),
            );
        }

        if self.commands.is_empty() {
            info!("no verification commands for this stack, passing");
            return VerificationResult::success()
                .with_stdout("No build commands configured for this stack");
        }

        for command in &self.commands {
            info!(command = %command, "running verification command");
            let result = match run_shell(command, project_root, self.timeout).await {
                ShellOutcome::Exited {
                    code: Some(0),
                    ..
                } => continue,
                ShellOutcome::Exited { code, stdout, stderr } => VerificationResult::failed(
                    command.as_str(),
                    code.unwrap_or(SYNTHETIC_EXIT_CODE),
                    stdout,
                    stderr,
                ),
                ShellOutcome::TimedOut => {
                    VerificationResult::timed_out(command.as_str(), self.timeout.as_secs())
                }
                ShellOutcome::SpawnFailed(reason) => {
                    VerificationResult::synthetic_failure(command.as_str(), reason)
                }
            };

            warn!(result = %result.summary(), "verification failed");
            return result.truncated(self.output_limit);
        }

        VerificationResult::success().with_command(self.commands.join(" && "))
    }
}
