//! Verifier port - runs build/test steps against a project root.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::models::VerificationResult;

/// Verification never errors: every problem, including timeouts and a
/// missing project root, is reported as a failed result.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, project_root: &Path) -> VerificationResult;
}
