//! Null context store.
//!
//! Used when retrieval is disabled but the scheduler still needs a
//! `ContextStore`.

use async_trait::async_trait;

use super::context_store::{ContextMetadata, ContextSnippet, ContextStore};
use crate::domain::errors::ContextStoreError;

/// A context store that remembers nothing.
#[derive(Debug, Clone, Default)]
pub struct NullContextStore;

impl NullContextStore {
    /// Store that keeps nothing.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextStore for NullContextStore {
    async fn insert(
        &self,
        _path: &str,
        _content: &str,
        _metadata: &ContextMetadata,
    ) -> Result<(), ContextStoreError> {
        Ok(())
    }

    async fn query(&self, _text: &str, _k: usize) -> Result<Vec<ContextSnippet>, ContextStoreError> {
        Ok(Vec::new())
    }
}
