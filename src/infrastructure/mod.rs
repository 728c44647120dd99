//! Infrastructure layer module
//!
//! Cross-cutting plumbing the adapters and CLI share:
//! - Configuration management (figment)
//! - Logging (tracing)
//! - Shell process execution

pub mod config;
pub mod logging;
pub mod process;
