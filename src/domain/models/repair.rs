//! Repair strategies, attempt history and the final repair report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fix_plan::{ApplyReport, FixPlan};
use super::verification::VerificationResult;

/// Hard bound on repair attempts: one per strategy.
pub const MAX_REPAIR_ATTEMPTS: usize = Strategy::ALL.len();

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Escalating repair strategies, tried strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// S0: syntax errors and missing imports.
    QuickFixes,
    /// S1: logic errors in the failing code.
    LogicFixes,
    /// S2: test setup, fixtures and configuration.
    TestConfig,
    /// S3: regenerate the failing file from its owning task.
    RegenerateUnit,
    /// S4: simplify the implementation.
    Simplify,
    /// S5: rewrite with a different approach.
    AlternativeApproach,
    /// S6: strip down to a minimal viable version.
    MinimalViable,
    /// S7: diagnose using the whole attempt history and project manifests.
    HolisticDiagnosis,
}

impl Strategy {
    pub const ALL: [Self; 8] = [
        Self::QuickFixes,
        Self::LogicFixes,
        Self::TestConfig,
        Self::RegenerateUnit,
        Self::Simplify,
        Self::AlternativeApproach,
        Self::MinimalViable,
        Self::HolisticDiagnosis,
    ];

    /// Where every repair run starts.
    pub const fn first() -> Self {
        Self::QuickFixes
    }

    /// Position in the escalation ladder (S0 = 0).
    pub const fn index(self) -> usize {
        match self {
            Self::QuickFixes => 0,
            Self::LogicFixes => 1,
            Self::TestConfig => 2,
            Self::RegenerateUnit => 3,
            Self::Simplify => 4,
            Self::AlternativeApproach => 5,
            Self::MinimalViable => 6,
            Self::HolisticDiagnosis => 7,
        }
    }

    /// The strategy after this one, or `None` when exhausted.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::QuickFixes => Some(Self::LogicFixes),
            Self::LogicFixes => Some(Self::TestConfig),
            Self::TestConfig => Some(Self::RegenerateUnit),
            Self::RegenerateUnit => Some(Self::Simplify),
            Self::Simplify => Some(Self::AlternativeApproach),
            Self::AlternativeApproach => Some(Self::MinimalViable),
            Self::MinimalViable => Some(Self::HolisticDiagnosis),
            Self::HolisticDiagnosis => None,
        }
    }

    /// Stable machine tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::QuickFixes => "quick_fixes",
            Self::LogicFixes => "logic_fixes",
            Self::TestConfig => "test_config",
            Self::RegenerateUnit => "regenerate_unit",
            Self::Simplify => "simplify",
            Self::AlternativeApproach => "alternative_approach",
            Self::MinimalViable => "minimal_viable",
            Self::HolisticDiagnosis => "holistic_diagnosis",
        }
    }

    /// Human-readable name.
    pub const fn label(self) -> &'static str {
        match self {
            Self::QuickFixes => "Quick Fixes (Syntax & Imports)",
            Self::LogicFixes => "Logic Error Fixes",
            Self::TestConfig => "Test Configuration Fixes",
            Self::RegenerateUnit => "Regenerate Failing Files",
            Self::Simplify => "Simplify Implementation",
            Self::AlternativeApproach => "Alternative Approach",
            Self::MinimalViable => "Minimal Viable Version",
            Self::HolisticDiagnosis => "Holistic Diagnosis",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{} {}", self.index(), self.tag())
    }
}

// ---------------------------------------------------------------------------
// Attempt history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    NoFixProposed,
    FixAppliedFailed,
}

/// One strategy invocation. Never mutated once appended to a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    /// 1-based.
    pub attempt_number: usize,
    pub strategy: Strategy,
    pub input_error: VerificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_fix: Option<FixPlan>,
    pub outcome: AttemptOutcome,
    /// Result of re-verifying after the fix was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_report: Option<ApplyReport>,
    /// Why no fix was proposed, when the generator said so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Append-only log of repair attempts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepairHistory {
    attempts: Vec<RepairAttempt>,
}

impl RepairHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt.
    pub fn push(&mut self, attempt: RepairAttempt) {
        self.attempts.push(attempt);
    }

    /// Attempts in order.
    pub fn records(&self) -> &[RepairAttempt] {
        &self.attempts
    }

    /// Number of attempts.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// True before the first attempt.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Most recent attempt.
    pub fn last(&self) -> Option<&RepairAttempt> {
        self.attempts.last()
    }

    /// Strategies tried, in order.
    pub fn strategies(&self) -> Vec<Strategy> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Success,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub status: RepairStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<Strategy>,
    pub attempts: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_error: Option<VerificationResult>,
    pub history: RepairHistory,
}

impl RepairReport {
    /// True when some strategy fixed the build.
    pub fn is_success(&self) -> bool {
        self.status == RepairStatus::Success
    }
}
