//! Prompt text for the LLM generator and planner.

use std::fmt::Write as _;

use crate::domain::models::{Strategy, Task};
use crate::domain::ports::{FixRequest, GenerationContext, ProjectProfile};

/// Characters of stdout/stderr quoted back to the model.
pub const ERROR_EXCERPT_CHARS: usize = 1500;

pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a software architect and task planner.
Analyze the user's project description and output ONLY valid JSON matching this schema:
{
  "project_name": "kebab-case project name",
  "tech_stack": ["technologies"],
  "core_features": ["specific, actionable features"],
  "execution_plan": [
    {
      "task_id": "unique_task_identifier",
      "task_description": "what this task accomplishes",
      "output_files": ["relative/file/paths"],
      "depends_on": ["task_ids that must complete first"]
    }
  ]
}

Rules for the execution plan:
1. It must be a directed acyclic graph. No circular dependencies. Every task_id is unique.
   Every id in depends_on refers to a task in the plan.
2. Dependencies must be logical: schema tasks first, APIs depend on schema, UI depends on the
   APIs it consumes, infrastructure (Docker, CI) depends on nothing.
3. Break the project into 5-15 tasks, each generating 1-5 related files.
4. Output files are concrete relative paths, e.g. "src/app/api/auth/route.ts".
5. No markdown, no explanations."#;

/// User prompt asking for a plan for `intent`.
pub fn planner_user_prompt(intent: &str) -> String {
    format!("Project intent: {intent}\n\nOutput the complete JSON specification with the execution plan:")
}

pub const GENERATOR_SYSTEM_PROMPT: &str = "You are an expert full-stack engineer. Your output is written \
directly to disk with no human review. Produce complete, working file contents that integrate with the \
existing project. Never wrap file contents in markdown fences. Respond with JSON only.";

fn profile_section(profile: &ProjectProfile) -> String {
    format!(
        "# PROJECT\nName: {}\nTech stack: {}\nFeatures: {}\n",
        profile.name,
        profile.tech_stack.join(", "),
        profile.features.join(", ")
    )
}

fn context_section(context: &GenerationContext) -> String {
    if context.snippets.is_empty() {
        return "# EXISTING CODE\nThis is a new project; no related files exist yet.\n".to_string();
    }
    let mut out = String::from(
        "# EXISTING CODE\nRelated files already in the project. Integrate with them; do not regenerate them.\n",
    );
    for snippet in &context.snippets {
        let _ = write!(
            out,
            "\n## From: {} (task {}, {})\n{}\n",
            snippet.path, snippet.task_id, snippet.language, snippet.content
        );
    }
    out
}

fn task_section(task: &Task) -> String {
    let mut out = format!("# TASK {}\n{}\n", task.id, task.description);
    if !task.depends_on.is_empty() {
        let _ = writeln!(out, "Builds on: {}", task.depends_on.join(", "));
    }
    out
}

/// Prompt for generating every output file of `task` in one call.
pub fn task_prompt(task: &Task, context: &GenerationContext) -> String {
    let files = task
        .output_paths
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}\n{}\n{}\n# OUTPUT\nGenerate these files:\n{files}\n\n\
         Respond with a JSON object mapping each relative file path to its complete content, \
         e.g. {{\"src/main.py\": \"...\"}}. Include every listed path.",
        profile_section(&context.profile),
        context_section(context),
        task_section(task),
    )
}

/// Prompt for generating a single file of `task`.
pub fn file_prompt(task: &Task, path: &str, context: &GenerationContext) -> String {
    format!(
        "{}\n{}\n{}\n# OUTPUT\nGenerate only the file `{path}`.\n\
         Respond with a JSON object {{\"content\": \"<complete file content>\"}}.",
        profile_section(&context.profile),
        context_section(context),
        task_section(task),
    )
}

const FIX_PLAN_SCHEMA: &str = r#"Return ONLY valid JSON with this schema:
{
  "error_summary": "brief description",
  "root_cause": "why this happened",
  "fixes": [
    {"file_path": "relative/path", "new_content": "complete file content with the fix", "reason": "why this works"}
  ],
  "additional_commands": ["commands to run after the fixes, e.g. pip install package"]
}
Return empty "fixes" and "additional_commands" if you have nothing to propose.
JSON files must not contain comments."#;

const LAYERED_SCHEMA: &str = r#"Return ONLY valid JSON with this schema:
{
  "error_summary": "brief description",
  "root_cause": "the underlying cause across all failed attempts",
  "layers": [
    {"kind": "dependencies", "fixes": [{"file_path": "...", "new_content": "...", "reason": "..."}], "commands": ["..."]},
    {"kind": "config", "fixes": [], "commands": []},
    {"kind": "code", "fixes": [], "commands": []}
  ]
}
Layers are applied in the order dependencies, config, code."#;

fn strategy_focus(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::QuickFixes => {
            "You specialize in QUICK FIXES. Focus only on missing imports or packages, syntax errors \
             (typos, missing colons, indentation), misspelled module names and simple type errors. \
             Apply the simplest fix that resolves the error."
        }
        Strategy::LogicFixes => {
            "The syntax is correct but the logic is broken. Focus on wrong value types, missing \
             null checks, incorrect return types, off-by-one errors and unhandled edge cases. \
             Fix the root cause in the failing file."
        }
        Strategy::TestConfig => {
            "The application code is likely correct; the problem is the TEST CONFIGURATION. Fix \
             fixtures, test client setup, mocks, test database connections and async test \
             decorators. Do not modify application code."
        }
        Strategy::RegenerateUnit => {
            "The failing file is broken beyond simple fixes. Write a NEW, simpler implementation \
             of it from scratch that fulfils its task: simpler patterns, fewer dependencies, more \
             defensive code. Return the complete regenerated file."
        }
        Strategy::Simplify => {
            "The implementation is too complex and breaking. Simplify dramatically: remove \
             non-core features, complex abstractions and clever optimizations. Keep basic \
             functionality with simple, obvious patterns. Working beats feature-complete."
        }
        Strategy::AlternativeApproach => {
            "The current approach has failed repeatedly. Use a completely different approach: \
             another architecture pattern, library, data flow or file organization. Be creative \
             but pragmatic."
        }
        Strategy::MinimalViable => {
            "Produce a MINIMAL VIABLE VERSION. Priority is code that builds and runs. Placeholder \
             functions, basic validation and hardcoded values are acceptable. Syntax errors, \
             missing imports and code that does not run are not."
        }
        Strategy::HolisticDiagnosis => {
            "Every targeted fix has failed. Diagnose the project as a whole using the attempt \
             history and the manifest files below. Look for version conflicts, missing \
             dependencies, misconfigured tooling and structural problems, then propose a \
             layered plan: dependency changes first, then configuration, then code."
        }
    }
}

/// System prompt for `strategy` on this project.
pub fn fix_system_prompt(strategy: Strategy, profile: &ProjectProfile) -> String {
    let schema = match strategy {
        Strategy::HolisticDiagnosis => LAYERED_SCHEMA,
        _ => FIX_PLAN_SCHEMA,
    };
    format!(
        "You are a debugging expert. Strategy: {}.\n{}\n\nProject: {}\nTech stack: {}\n\n{schema}",
        strategy.label(),
        strategy_focus(strategy),
        profile.name,
        profile.tech_stack.join(", "),
    )
}

fn excerpt(text: &str) -> String {
    crate::domain::models::truncate_output(text, ERROR_EXCERPT_CHARS)
}

/// User prompt describing the failure and inputs for one strategy.
pub fn fix_user_prompt(request: &FixRequest<'_>) -> String {
    let error = request.error;
    let mut out = format!(
        "Command: {}\nExit code: {}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}\n",
        error.command.as_deref().unwrap_or("unknown"),
        error
            .exit_code
            .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
        excerpt(&error.stdout),
        excerpt(&error.stderr),
    );

    if let Some(unit) = &request.failing_unit {
        let _ = write!(out, "\n# FAILING FILE: {}\n", unit.path);
        if let Some(task) = &unit.task {
            let _ = writeln!(out, "Produced by task {}: {}", task.id, task.description);
        }
        match &unit.content {
            Some(content) => {
                let _ = write!(out, "Current content:\n{content}\n");
            }
            None => out.push_str("The file does not exist yet.\n"),
        }
    }

    if matches!(request.strategy, Strategy::AlternativeApproach) && !request.profile.features.is_empty() {
        let features: Vec<&str> = request.profile.features.iter().take(3).map(String::as_str).collect();
        let _ = writeln!(out, "\nCore features to preserve: {}", features.join(", "));
    }

    if !request.history.is_empty() {
        out.push_str("\n# EARLIER ATTEMPTS\n");
        for attempt in request.history {
            let _ = writeln!(
                out,
                "- {} ({}): {:?}{}",
                attempt.strategy,
                attempt.strategy.label(),
                attempt.outcome,
                attempt
                    .proposed_fix
                    .as_ref()
                    .filter(|p| !p.root_cause.is_empty())
                    .map(|p| format!(", suspected cause: {}", p.root_cause))
                    .unwrap_or_default(),
            );
        }
    }

    if !request.project_files.is_empty() {
        out.push_str("\n# PROJECT MANIFESTS\n");
        for file in &request.project_files {
            let _ = write!(out, "\n## {}\n{}\n", file.path, file.content);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::VerificationResult;
    use crate::domain::ports::{ContextSnippet, FailingUnit, ProjectFile};

    fn profile() -> ProjectProfile {
        ProjectProfile {
            name: "shop".into(),
            tech_stack: vec!["fastapi".into()],
            features: vec!["cart".into(), "checkout".into()],
        }
    }

    #[test]
    fn test_every_strategy_has_distinct_focus() {
        let focuses: std::collections::HashSet<_> =
            Strategy::ALL.iter().map(|s| strategy_focus(*s)).collect();
        assert_eq!(focuses.len(), Strategy::ALL.len());
    }

    #[test]
    fn test_holistic_prompt_uses_layered_schema() {
        let p = fix_system_prompt(Strategy::HolisticDiagnosis, &profile());
        assert!(p.contains("\"layers\""));
        let q = fix_system_prompt(Strategy::QuickFixes, &profile());
        assert!(q.contains("\"additional_commands\""));
        assert!(q.contains("shop"));
    }

    #[test]
    fn test_user_prompt_includes_unit_and_manifests() {
        let error = VerificationResult::failed("pytest", 1, "", "boom");
        let profile = profile();
        let request = FixRequest {
            strategy: Strategy::HolisticDiagnosis,
            error: &error,
            history: &[],
            profile: &profile,
            project_files: vec![ProjectFile {
                path: "requirements.txt".into(),
                content: "fastapi==0.1".into(),
            }],
            failing_unit: Some(FailingUnit {
                path: "app/main.py".into(),
                content: Some("import x".into()),
                task: None,
            }),
        };
        let prompt = fix_user_prompt(&request);
        assert!(prompt.contains("Command: pytest"));
        assert!(prompt.contains("# FAILING FILE: app/main.py"));
        assert!(prompt.contains("import x"));
        assert!(prompt.contains("fastapi==0.1"));
    }

    #[test]
    fn test_task_prompt_lists_outputs() {
        let task = Task::new("api", "Build the API").with_outputs(["app/main.py", "app/db.py"]);
        let prompt = task_prompt(&task, &GenerationContext::default());
        assert!(prompt.contains("  - app/main.py"));
        assert!(prompt.contains("new project"));
    }

    #[test]
    fn test_context_names_source_task_and_language() {
        let task = Task::new("routes", "Add routes").with_outputs(["app/routes.py"]);
        let context = GenerationContext {
            profile: profile(),
            snippets: vec![ContextSnippet {
                path: "app/models.py".into(),
                content: "class User: ...".into(),
                score: 0.8,
                task_id: "models".into(),
                language: "python".into(),
            }],
        };
        let prompt = file_prompt(&task, "app/routes.py", &context);
        assert!(prompt.contains("## From: app/models.py (task models, python)"));
        assert!(prompt.contains("class User: ..."));
    }
}
