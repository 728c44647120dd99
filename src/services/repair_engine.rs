//! Escalating repair state machine.
//!
//! Strategies run strictly in order, S0 through S7. Each one gets the current
//! failure and the attempts so far, and may propose a fix plan. A proposed
//! plan is applied and the project re-verified; success ends the run, a new
//! failure becomes the input of the next strategy. Running past S7 is
//! exhaustion. The attempt history is append-only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::domain::models::{
    truncate_output, AttemptOutcome, FixPlan, RepairAttempt, RepairHistory, RepairReport,
    RepairStatus, Strategy, TaskGraph, VerificationResult,
};
use crate::domain::ports::{
    FailingUnit, FixRequest, Generator, ProjectFile, ProjectProfile, Verifier,
};

use super::fix_applier::FixApplier;

/// Which extra inputs a strategy receives besides the error and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrategyInputs {
    failing_unit: bool,
    manifests: bool,
}

const fn inputs_for(strategy: Strategy) -> StrategyInputs {
    match strategy {
        Strategy::QuickFixes
        | Strategy::TestConfig
        | Strategy::AlternativeApproach
        | Strategy::MinimalViable => StrategyInputs {
            failing_unit: false,
            manifests: false,
        },
        Strategy::LogicFixes | Strategy::RegenerateUnit | Strategy::Simplify => StrategyInputs {
            failing_unit: true,
            manifests: false,
        },
        Strategy::HolisticDiagnosis => StrategyInputs {
            failing_unit: true,
            manifests: true,
        },
    }
}

pub struct RepairEngine {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    applier: FixApplier,
    profile: ProjectProfile,
    graph: TaskGraph,
    manifest_files: Vec<String>,
    max_file_chars: usize,
}

impl RepairEngine {
    /// Engine driving the strategy ladder with these adapters.
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
        applier: FixApplier,
        profile: ProjectProfile,
    ) -> Self {
        Self {
            generator,
            verifier,
            applier,
            profile,
            graph: TaskGraph::default(),
            manifest_files: Vec::new(),
            max_file_chars: 6000,
        }
    }

    /// Graph used to find the task owning a failing file.
    #[must_use]
    pub fn with_graph(mut self, graph: TaskGraph) -> Self {
        self.graph = graph;
        self
    }

    #[must_use]
    pub fn with_manifest_files(mut self, files: Vec<String>) -> Self {
        self.manifest_files = files;
        self
    }

    #[must_use]
    pub fn with_max_file_chars(mut self, max_file_chars: usize) -> Self {
        self.max_file_chars = max_file_chars;
        self
    }

    fn project_root(&self) -> PathBuf {
        self.applier.workspace().root().to_path_buf()
    }

    /// Drive the state machine from `initial_error` to success or exhaustion.
    #[instrument(skip_all, fields(command = ?initial_error.command))]
    pub async fn repair(&self, initial_error: VerificationResult) -> RepairReport {
        let mut history = RepairHistory::new();
        let mut current_error = initial_error;
        let mut next = Some(Strategy::first());

        while let Some(strategy) = next {
            let attempt_number = history.len() + 1;
            let started_at = Utc::now();
            let clock = Instant::now();
            info!(attempt = attempt_number, %strategy, label = strategy.label(), "repair attempt started");

            let proposal = self.propose(strategy, &current_error, &history).await;

            let mut attempt = RepairAttempt {
                attempt_number,
                strategy,
                input_error: current_error.clone(),
                proposed_fix: None,
                outcome: AttemptOutcome::NoFixProposed,
                verification: None,
                apply_report: None,
                note: None,
                started_at,
                duration_ms: 0,
            };

            match proposal {
                Err(note) => {
                    info!(attempt = attempt_number, %strategy, note = ?note, "no fix proposed");
                    attempt.note = note;
                }
                Ok(plan) => {
                    let apply_report = self.applier.apply(&plan).await;
                    let verification = self.verifier.verify(&self.project_root()).await;
                    attempt.proposed_fix = Some(plan);
                    attempt.apply_report = Some(apply_report);

                    if verification.is_success() {
                        attempt.outcome = AttemptOutcome::Success;
                        attempt.verification = Some(verification);
                        attempt.duration_ms = elapsed_ms(clock);
                        history.push(attempt);
                        info!(attempt = attempt_number, %strategy, "repair succeeded");
                        return RepairReport {
                            status: RepairStatus::Success,
                            strategy_used: Some(strategy),
                            attempts: attempt_number,
                            final_error: None,
                            history,
                        };
                    }

                    warn!(
                        attempt = attempt_number,
                        %strategy,
                        failure = %verification.summary(),
                        "fix applied but verification still fails"
                    );
                    attempt.outcome = AttemptOutcome::FixAppliedFailed;
                    attempt.verification = Some(verification.clone());
                    current_error = verification;
                }
            }

            attempt.duration_ms = elapsed_ms(clock);
            history.push(attempt);
            next = strategy.next();
        }

        warn!(attempts = history.len(), "repair strategies exhausted");
        RepairReport {
            status: RepairStatus::Exhausted,
            strategy_used: None,
            attempts: history.len(),
            final_error: Some(current_error),
            history,
        }
    }

    /// Ask the generator for a plan. `Err` carries an optional note explaining
    /// why there is nothing to apply.
    async fn propose(
        &self,
        strategy: Strategy,
        error: &VerificationResult,
        history: &RepairHistory,
    ) -> Result<FixPlan, Option<String>> {
        let inputs = inputs_for(strategy);
        let failing_unit = if inputs.failing_unit {
            self.failing_unit(error).await
        } else {
            None
        };
        let project_files = if inputs.manifests {
            self.manifests().await
        } else {
            Vec::new()
        };

        let request = FixRequest {
            strategy,
            error,
            history: history.records(),
            profile: &self.profile,
            project_files,
            failing_unit,
        };

        match self.generator.propose_fix(&request).await {
            Ok(Some(plan)) if !plan.is_empty() => Ok(plan),
            Ok(Some(_)) => Err(Some("strategy proposed an empty plan".to_string())),
            Ok(None) => Err(None),
            Err(err) => {
                warn!(%strategy, error = %err, "fix proposal failed");
                Err(Some(err.to_string()))
            }
        }
    }

    async fn failing_unit(&self, error: &VerificationResult) -> Option<FailingUnit> {
        let reported = error.failing_file()?;
        let workspace = self.applier.workspace();
        let path = workspace.relativize(&reported);
        let content = workspace
            .read_file(&path)
            .await
            .map(|c| truncate_output(&c, self.max_file_chars));
        let task = self.graph.owner_of(&path).cloned();
        Some(FailingUnit {
            path,
            content,
            task,
        })
    }

    async fn manifests(&self) -> Vec<ProjectFile> {
        let workspace = self.applier.workspace();
        let mut files = Vec::new();
        for path in &self.manifest_files {
            if let Some(content) = workspace.read_file(path).await {
                files.push(ProjectFile {
                    path: path.clone(),
                    content: truncate_output(&content, self.max_file_chars),
                });
            }
        }
        files
    }
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{ScriptedGenerator, SequenceVerifier};
    use crate::domain::models::{FileFix, Task};
    use crate::services::workspace::ProjectWorkspace;
    use std::time::Duration;

    fn engine(
        root: &std::path::Path,
        generator: Arc<ScriptedGenerator>,
        verifier: Arc<SequenceVerifier>,
    ) -> RepairEngine {
        RepairEngine::new(
            generator,
            verifier,
            FixApplier::new(ProjectWorkspace::new(root), Duration::from_secs(10)),
            ProjectProfile::default(),
        )
    }

    fn failure() -> VerificationResult {
        VerificationResult::failed("pytest", 1, "", "File \"app/main.py\", line 1\nSyntaxError")
    }

    fn plan(path: &str) -> FixPlan {
        FixPlan::new().with_fix(FileFix::new(path, "ok\n", "fix"))
    }

    #[tokio::test]
    async fn test_no_proposals_exhausts_all_strategies_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let gen = Arc::new(ScriptedGenerator::new());
        let verifier = Arc::new(SequenceVerifier::always_failing());

        let report = engine(dir.path(), gen.clone(), verifier.clone())
            .repair(failure())
            .await;

        assert_eq!(report.status, RepairStatus::Exhausted);
        assert_eq!(report.attempts, 8);
        assert_eq!(report.history.strategies(), Strategy::ALL.to_vec());
        assert!(report
            .history
            .records()
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NoFixProposed));
        assert_eq!(verifier.calls(), 0);
        assert_eq!(report.final_error, Some(failure()));
    }

    #[tokio::test]
    async fn test_failed_fix_feeds_new_error_forward() {
        let dir = tempfile::tempdir().unwrap();
        let gen = Arc::new(ScriptedGenerator::new().with_fix(Strategy::QuickFixes, plan("a.py")));
        let second = VerificationResult::failed("pytest", 2, "", "new failure");
        let verifier = Arc::new(SequenceVerifier::new(vec![second.clone()]));

        let report = engine(dir.path(), gen, verifier).repair(failure()).await;

        let records = report.history.records();
        assert_eq!(records[0].outcome, AttemptOutcome::FixAppliedFailed);
        assert_eq!(records[0].verification.as_ref(), Some(&second));
        assert_eq!(records[1].input_error, second);
        assert_eq!(report.final_error, Some(second));
    }

    #[tokio::test]
    async fn test_generator_errors_are_recorded_as_no_fix() {
        let dir = tempfile::tempdir().unwrap();
        let gen = Arc::new(ScriptedGenerator::new().with_fix_error(Strategy::QuickFixes, "backend down"));
        let verifier = Arc::new(SequenceVerifier::always_failing());

        let report = engine(dir.path(), gen, verifier).repair(failure()).await;
        let first = &report.history.records()[0];
        assert_eq!(first.outcome, AttemptOutcome::NoFixProposed);
        assert!(first.note.as_deref().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn test_empty_plan_is_not_a_proposal() {
        let dir = tempfile::tempdir().unwrap();
        let gen = Arc::new(ScriptedGenerator::new().with_fix(Strategy::QuickFixes, FixPlan::new()));
        let verifier = Arc::new(SequenceVerifier::always_failing());

        let report = engine(dir.path(), gen, verifier.clone()).repair(failure()).await;
        assert_eq!(report.history.records()[0].outcome, AttemptOutcome::NoFixProposed);
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_regenerate_unit_receives_failing_file_and_owner() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/main.py"), "def broken(:\n").unwrap();
        let gen = Arc::new(ScriptedGenerator::new());
        let graph = TaskGraph::new(vec![Task::new("api", "api").with_outputs(["app/main.py"])]);

        engine(dir.path(), gen.clone(), Arc::new(SequenceVerifier::always_failing()))
            .with_graph(graph)
            .repair(failure())
            .await;

        let seen = gen.fix_requests();
        let regenerate = seen
            .iter()
            .find(|r| r.strategy == Strategy::RegenerateUnit)
            .unwrap();
        let unit = regenerate.failing_unit.as_ref().unwrap();
        assert_eq!(unit.path, "app/main.py");
        assert_eq!(unit.content.as_deref(), Some("def broken(:\n"));
        assert_eq!(unit.task.as_ref().map(|t| t.id.as_str()), Some("api"));

        let quick = seen.iter().find(|r| r.strategy == Strategy::QuickFixes).unwrap();
        assert!(quick.failing_unit.is_none());
    }

    #[tokio::test]
    async fn test_holistic_diagnosis_sees_history_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "fastapi\n").unwrap();
        let gen = Arc::new(ScriptedGenerator::new());

        engine(dir.path(), gen.clone(), Arc::new(SequenceVerifier::always_failing()))
            .with_manifest_files(vec!["requirements.txt".into(), "package.json".into()])
            .repair(failure())
            .await;

        let seen = gen.fix_requests();
        let last = seen.last().unwrap();
        assert_eq!(last.strategy, Strategy::HolisticDiagnosis);
        assert_eq!(last.history_len, 7);
        assert_eq!(last.project_files.len(), 1);
        assert_eq!(last.project_files[0].path, "requirements.txt");
    }
}
