//! Run state persistence ports.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::errors::RunStateError;
use crate::domain::models::RunState;

#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Load the persisted state. `RunStateError::NotFound` when there is none.
    async fn load(&self) -> Result<RunState, RunStateError>;

    async fn save(&self, state: &RunState) -> Result<(), RunStateError>;
}

/// Receives the completed set after every wave.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn checkpoint(&self, completed: &BTreeSet<String>) -> Result<(), RunStateError>;
}
