//! OpenAI-compatible LLM adapters.

pub mod client;
pub mod generator;
pub mod planner;
pub mod prompts;

pub use client::{extract_json, strip_code_fences, ChatClient};
pub use generator::LlmGenerator;
pub use planner::LlmPlanner;
