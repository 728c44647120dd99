//! Task model: one named unit of work that produces files.

use serde::{Deserialize, Serialize};

/// A unit of work in the build graph.
///
/// Tasks are immutable once the graph is built. The scheduler only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique, run-stable identifier.
    #[serde(alias = "task_id")]
    pub id: String,

    /// Opaque instructions passed to the generator.
    #[serde(default, alias = "task_description")]
    pub description: String,

    /// Relative paths this task must produce, in declared order.
    #[serde(default, alias = "output_files")]
    pub output_paths: Vec<String>,

    /// Ids of tasks that must complete first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Task {
    /// Task with no dependencies or outputs.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            output_paths: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Add declared outputs. Duplicates are ignored so the list stays an ordered set.
    #[must_use]
    pub fn with_outputs<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !self.output_paths.contains(&path) {
                self.output_paths.push(path);
            }
        }
        self
    }

    /// Add dependencies. Duplicates are ignored.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.depends_on.contains(&id) {
                self.depends_on.push(id);
            }
        }
        self
    }

    /// Whether `path` is one of this task's outputs.
    pub fn produces(&self, path: &str) -> bool {
        self.output_paths.iter().any(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_dedups_outputs_and_dependencies() {
        let task = Task::new("api", "build the api")
            .with_outputs(["src/main.py", "src/main.py", "README.md"])
            .with_dependencies(["db", "db"]);

        assert_eq!(task.output_paths, vec!["src/main.py", "README.md"]);
        assert_eq!(task.depends_on, vec!["db"]);
        assert!(task.produces("README.md"));
        assert!(!task.produces("src/other.py"));
    }

    #[test]
    fn test_deserializes_planner_field_names() {
        let json = r#"{
            "task_id": "models",
            "task_description": "Create ORM models",
            "output_files": ["app/models.py"],
            "depends_on": ["config"]
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "models");
        assert_eq!(task.description, "Create ORM models");
        assert_eq!(task.output_paths, vec!["app/models.py"]);
        assert_eq!(task.depends_on, vec!["config"]);
    }
}
