//! LLM-backed planner.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::domain::errors::{GeneratorResult, PlannerError};
use crate::domain::models::{GeneratorConfig, ProjectPlan};
use crate::domain::ports::Planner;

use super::client::ChatClient;
use super::prompts;

#[derive(Debug, Clone)]
pub struct LlmPlanner {
    client: ChatClient,
}

impl LlmPlanner {
    /// Planner over `client`.
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }

    /// Planner with a client built from `config`.
    pub fn from_config(config: &GeneratorConfig) -> GeneratorResult<Self> {
        Ok(Self::new(ChatClient::from_env(config.clone())?))
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    #[instrument(skip_all, fields(model = %self.client.model()))]
    async fn plan(&self, intent: &str) -> Result<ProjectPlan, PlannerError> {
        if intent.trim().is_empty() {
            return Err(PlannerError::Malformed("intent is empty".to_string()));
        }

        let value = self
            .client
            .complete_json(
                prompts::PLANNER_SYSTEM_PROMPT,
                &prompts::planner_user_prompt(intent),
                self.client.temperature(),
            )
            .await?;

        let plan: ProjectPlan =
            serde_json::from_value(value).map_err(|e| PlannerError::Malformed(e.to_string()))?;
        if plan.graph.is_empty() {
            return Err(PlannerError::Malformed("plan has no tasks".to_string()));
        }

        info!(project = %plan.name, tasks = plan.graph.len(), "planner produced a plan");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(server: &mockito::Server) -> LlmPlanner {
        let config = GeneratorConfig {
            base_url: server.url(),
            max_retries: 0,
            requests_per_second: 100.0,
            ..GeneratorConfig::default()
        };
        LlmPlanner::new(ChatClient::new(config, Some("k".into())).unwrap())
    }

    fn reply(content: serde_json::Value) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_parses_planner_keys() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_body(reply(serde_json::json!({
                "project_name": "todo-api",
                "tech_stack": ["python", "fastapi"],
                "database_schema": "todos(id, title)",
                "core_features": ["crud"],
                "execution_plan": [
                    {"task_id": "db", "task_description": "schema", "output_files": ["app/db.py"], "depends_on": []},
                    {"task_id": "api", "task_description": "routes", "output_files": ["app/main.py"], "depends_on": ["db"]}
                ]
            })))
            .create_async()
            .await;

        let plan = planner(&server).plan("a todo api").await.unwrap();
        assert_eq!(plan.name, "todo-api");
        assert_eq!(plan.tech_stack, vec!["python", "fastapi"]);
        assert_eq!(plan.graph.len(), 2);
        assert!(plan.graph.validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_plan_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_body(reply(serde_json::json!({"project_name": "x", "execution_plan": []})))
            .create_async()
            .await;

        let err = planner(&server).plan("anything").await.unwrap_err();
        assert!(matches!(err, PlannerError::Malformed(_)));
    }
}
