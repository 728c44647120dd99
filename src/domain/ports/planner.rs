//! Planner port - turns a free-form intent into a project plan.

use async_trait::async_trait;

use crate::domain::errors::PlannerError;
use crate::domain::models::ProjectPlan;

#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan a project. The returned graph is not yet validated.
    async fn plan(&self, intent: &str) -> Result<ProjectPlan, PlannerError>;
}
