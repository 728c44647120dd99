//! Context store port - retrieval index over generated files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ContextStoreError;

/// Metadata stored alongside each inserted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub task_id: String,
    pub language: String,
    pub file_type: String,
}

/// One ranked query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub path: String,
    pub content: String,
    pub score: f32,
    /// Task that produced the file.
    pub task_id: String,
    pub language: String,
}

/// Failures here are never fatal: callers log them and continue with no context.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn insert(
        &self,
        path: &str,
        content: &str,
        metadata: &ContextMetadata,
    ) -> Result<(), ContextStoreError>;

    /// Up to `k` snippets, best match first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ContextSnippet>, ContextStoreError>;
}
