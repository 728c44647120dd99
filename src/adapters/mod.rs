//! Adapters implementing the domain ports.

pub mod context_store;
pub mod llm;
pub mod mock;
pub mod run_state_store;
pub mod system_probe;
pub mod verifier;

pub use context_store::InMemoryContextStore;
pub use llm::{ChatClient, LlmGenerator, LlmPlanner};
pub use run_state_store::JsonRunStateStore;
pub use system_probe::SysinfoProbe;
pub use verifier::{commands_for_stack, CommandVerifier};
