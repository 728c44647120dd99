//! Verification results and diagnostic helpers.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::fix_plan::FixPlan;

/// Exit code reported for failures that never produced a real exit status
/// (timeouts, spawn failures, missing project root).
pub const SYNTHETIC_EXIT_CODE: i32 = -1;

const TRUNCATION_MARKER: &str = "\n… (truncated)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Success,
    Failed,
}

/// Outcome of running the verification steps against a project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,

    /// The step that failed, or the last step run on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,

    /// A fix proposal attached by the verifier, if it offers one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<FixPlan>,
}

impl VerificationResult {
    /// Passing result with no command attached.
    pub fn success() -> Self {
        Self {
            status: VerificationStatus::Success,
            command: None,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            diagnosis: None,
        }
    }

    /// Failed run of `command` with its exit code and output.
    pub fn failed(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            status: VerificationStatus::Failed,
            command: Some(command.into()),
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            diagnosis: None,
        }
    }

    /// A failure with no real process behind it.
    pub fn synthetic_failure(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::failed(command, SYNTHETIC_EXIT_CODE, String::new(), reason)
    }

    /// `command` exceeded `timeout_secs`.
    pub fn timed_out(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self::synthetic_failure(
            command,
            format!("Command timed out after {timeout_secs} seconds"),
        )
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    #[must_use]
    pub fn with_diagnosis(mut self, diagnosis: FixPlan) -> Self {
        self.diagnosis = Some(diagnosis);
        self
    }

    /// Bound stdout and stderr to `max_chars` characters each.
    #[must_use]
    pub fn truncated(mut self, max_chars: usize) -> Self {
        self.stdout = truncate_output(&self.stdout, max_chars);
        self.stderr = truncate_output(&self.stderr, max_chars);
        self
    }

    /// True when every command passed.
    pub fn is_success(&self) -> bool {
        self.status == VerificationStatus::Success
    }

    /// One-line description suitable for logs and status tables.
    pub fn summary(&self) -> String {
        match self.status {
            VerificationStatus::Success => "passed".to_string(),
            VerificationStatus::Failed => {
                let command = self.command.as_deref().unwrap_or("<unknown>");
                let first_line = self
                    .stderr
                    .lines()
                    .chain(self.stdout.lines())
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or("");
                match self.exit_code {
                    Some(code) => format!("`{command}` exited with {code}: {first_line}"),
                    None => format!("`{command}` failed: {first_line}"),
                }
            }
        }
    }

    /// Best guess at the source file responsible for the failure.
    pub fn failing_file(&self) -> Option<String> {
        extract_failing_file(&self.stderr).or_else(|| extract_failing_file(&self.stdout))
    }
}

/// Truncate to at most `max_chars` characters, keeping the head and marking the cut.
pub fn truncate_output(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &s[..byte_idx]),
    }
}

static FAILING_FILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Python traceback frame
        r#"File "([^"]+\.py)""#,
        // pytest summaries
        r"(?:Error in|Failed:|FAILED|ERROR)\s+([^\s:]+\.py)",
        // rustc
        r"-->\s+([^\s:]+\.rs):\d+",
        // tsc: path(line,col)
        r"([^\s():]+\.(?:ts|tsx|js|jsx))\(\d+,\d+\)",
        // eslint / node / go: path:line:col
        r"([^\s():]+\.(?:ts|tsx|js|jsx|mjs|go|py)):\d+:\d+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Pull the first recognizable source path out of tool output.
pub fn extract_failing_file(output: &str) -> Option<String> {
    FAILING_FILE_PATTERNS.iter().find_map(|re| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_output() {
        assert_eq!(truncate_output("short", 10), "short");
        assert_eq!(truncate_output("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let out = truncate_output("héllo wörld", 4);
        assert!(out.starts_with("héll"));
        assert!(out.ends_with("(truncated)"));
    }

    #[test]
    fn test_failing_file_from_python_traceback() {
        let result = VerificationResult::failed(
            "python3 -m pytest",
            1,
            "",
            "Traceback (most recent call last):\n  File \"app/main.py\", line 3, in <module>\nImportError: x",
        );
        assert_eq!(result.failing_file().as_deref(), Some("app/main.py"));
    }

    #[test]
    fn test_failing_file_from_rustc() {
        let stderr = "error[E0425]: cannot find value `x`\n --> src/lib.rs:4:5\n";
        assert_eq!(extract_failing_file(stderr).as_deref(), Some("src/lib.rs"));
    }

    #[test]
    fn test_failing_file_from_tsc() {
        let stdout = "src/app.tsx(12,7): error TS2322: Type 'string' is not assignable";
        assert_eq!(extract_failing_file(stdout).as_deref(), Some("src/app.tsx"));
    }

    #[test]
    fn test_failing_file_unknown() {
        assert_eq!(extract_failing_file("npm ERR! missing script: build"), None);
    }

    #[test]
    fn test_summary_uses_first_nonempty_line() {
        let result = VerificationResult::failed("npm run build", 2, "", "\n  boom\nmore");
        assert_eq!(result.summary(), "`npm run build` exited with 2: boom");
        assert_eq!(VerificationResult::success().summary(), "passed");
    }

    #[test]
    fn test_timed_out_is_synthetic() {
        let result = VerificationResult::timed_out("npm test", 600);
        assert!(!result.is_success());
        assert_eq!(result.exit_code, Some(SYNTHETIC_EXIT_CODE));
        assert_eq!(result.stderr, "Command timed out after 600 seconds");
    }
}
