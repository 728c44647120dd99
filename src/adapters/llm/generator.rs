//! LLM-backed generator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::errors::{GeneratorError, GeneratorResult};
use crate::domain::models::{FixPlan, GeneratorConfig, Task};
use crate::domain::ports::{FixRequest, GenerationContext, Generator};

use super::client::{strip_code_fences, ChatClient};
use super::prompts;

#[derive(Debug, Clone)]
pub struct LlmGenerator {
    client: ChatClient,
}

impl LlmGenerator {
    /// Generator over `client`.
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Generator with a client built from `config`.
    pub fn from_config(config: &GeneratorConfig) -> GeneratorResult<Self> {
        Ok(Self::new(ChatClient::from_env(config.clone())?))
    }
}

/// Read a `{path: content}` object, also accepting one nested under `files`.
fn files_from_value(value: Value) -> GeneratorResult<BTreeMap<String, String>> {
    let object = match value {
        Value::Object(mut map) => match map.remove("files") {
            Some(Value::Object(files)) => files,
            Some(other) => {
                map.insert("files".to_string(), other);
                map
            }
            None => map,
        },
        other => {
            return Err(GeneratorError::MalformedResponse(format!(
                "expected a JSON object of files, got {}",
                kind_of(&other)
            )))
        }
    };

    Ok(object
        .into_iter()
        .filter_map(|(path, content)| match content {
            Value::String(s) => Some((path, strip_code_fences(&s).to_string())),
            _ => None,
        })
        .collect())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn clean_plan(mut plan: FixPlan) -> FixPlan {
    let strip = |fixes: &mut Vec<crate::domain::models::FileFix>| {
        for fix in fixes {
            fix.new_content = strip_code_fences(&fix.new_content).to_string();
        }
    };
    strip(&mut plan.fixes);
    for layer in &mut plan.layers {
        strip(&mut layer.fixes);
    }
    plan
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &'static str {
        "llm"
    }

    #[instrument(skip_all, fields(task_id = %task.id, model = %self.client.model()))]
    async fn generate_task(
        &self,
        task: &Task,
        context: &GenerationContext,
    ) -> GeneratorResult<BTreeMap<String, String>> {
        let value = self
            .client
            .complete_json(
                prompts::GENERATOR_SYSTEM_PROMPT,
                &prompts::task_prompt(task, context),
                self.client.temperature(),
            )
            .await?;
        let files = files_from_value(value)?;
        debug!(returned = files.len(), expected = task.output_paths.len(), "batch generation returned");
        Ok(files)
    }

    #[instrument(skip_all, fields(task_id = %task.id, path))]
    async fn generate_file(
        &self,
        task: &Task,
        path: &str,
        context: &GenerationContext,
    ) -> GeneratorResult<String> {
        let value = self
            .client
            .complete_json(
                prompts::GENERATOR_SYSTEM_PROMPT,
                &prompts::file_prompt(task, path, context),
                self.client.temperature(),
            )
            .await?;

        match value.get("content") {
            Some(Value::String(content)) => Ok(strip_code_fences(content).to_string()),
            _ => Err(GeneratorError::MalformedResponse(format!(
                "no string \"content\" for {path}"
            ))),
        }
    }

    #[instrument(skip_all, fields(strategy = %request.strategy))]
    async fn propose_fix(&self, request: &FixRequest<'_>) -> GeneratorResult<Option<FixPlan>> {
        let value = self
            .client
            .complete_json(
                &prompts::fix_system_prompt(request.strategy, request.profile),
                &prompts::fix_user_prompt(request),
                self.client.temperature(),
            )
            .await?;

        let plan: FixPlan = serde_json::from_value(value)
            .map_err(|e| GeneratorError::MalformedResponse(format!("invalid fix plan: {e}")))?;

        if plan.is_empty() {
            return Ok(None);
        }
        Ok(Some(clean_plan(plan)))
    }
}
