//! Task graph model and validation.
//!
//! A [`TaskGraph`] is an ordered collection of tasks as declared. It becomes
//! schedulable only once wrapped in a [`ValidatedGraph`], which proves that
//! ids are unique, every dependency exists, and the dependency relation is
//! acyclic.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::task::Task;
use crate::domain::errors::{GraphError, GraphResult};

/// An ordered, not yet validated collection of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    /// Graph over `tasks`, unvalidated.
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Append a task.
    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when there are no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task with `id`.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// The first task that declares `path` as an output.
    pub fn owner_of(&self, path: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.produces(path))
    }

    /// Check the graph's structural invariants.
    ///
    /// Checks run in a fixed order (duplicate ids, unknown dependencies,
    /// cycles) and the traversal follows declared order, so the same graph
    /// always yields the same error.
    pub fn validate(&self) -> GraphResult<()> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.tasks.len());
        for (i, task) in self.tasks.iter().enumerate() {
            if index.insert(task.id.as_str(), i).is_some() {
                return Err(GraphError::DuplicateId {
                    id: task.id.clone(),
                });
            }
        }

        for task in &self.tasks {
            if let Some(missing) = task
                .depends_on
                .iter()
                .find(|dep| !index.contains_key(dep.as_str()))
            {
                return Err(GraphError::UnknownDependency {
                    task: task.id.clone(),
                    missing_id: missing.clone(),
                });
            }
        }

        match self.find_cycle(&index) {
            Some(cycle_path) => Err(GraphError::Cycle { cycle_path }),
            None => Ok(()),
        }
    }

    fn find_cycle(&self, index: &HashMap<&str, usize>) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.tasks.len()];
        let mut path = Vec::new();

        for start in 0..self.tasks.len() {
            if marks[start] == Mark::Unvisited {
                if let Some(cycle) = self.visit(start, index, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit(
        &self,
        node: usize,
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        marks[node] = Mark::OnPath;
        path.push(node);

        for dep in &self.tasks[node].depends_on {
            let Some(&next) = index.get(dep.as_str()) else {
                continue;
            };
            match marks[next] {
                Mark::OnPath => {
                    let cycle_start = path.iter().position(|&n| n == next).unwrap_or(0);
                    return Some(
                        path[cycle_start..]
                            .iter()
                            .map(|&n| self.tasks[n].id.clone())
                            .collect(),
                    );
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit(next, index, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// A graph that has passed [`TaskGraph::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: TaskGraph,
}

impl ValidatedGraph {
    /// Validate `graph`, rejecting cycles, duplicates and unknown dependencies.
    pub fn new(graph: TaskGraph) -> GraphResult<Self> {
        graph.validate()?;
        Ok(Self { graph })
    }

    /// Underlying graph.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Unwrap the graph.
    pub fn into_inner(self) -> TaskGraph {
        self.graph
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        self.graph.tasks()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// True when there are no tasks.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Every task id.
    pub fn all_ids(&self) -> BTreeSet<String> {
        self.graph.tasks.iter().map(|t| t.id.clone()).collect()
    }

    /// Whether a task with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.graph.get(id).is_some()
    }

    /// Tasks not yet completed whose dependencies all are, in declared order.
    pub fn ready_set<'a>(&'a self, completed: &BTreeSet<String>) -> Vec<&'a Task> {
        self.graph
            .tasks
            .iter()
            .filter(|t| !completed.contains(&t.id))
            .filter(|t| t.depends_on.iter().all(|d| completed.contains(d)))
            .collect()
    }

    /// Ids of tasks not in `completed`, in declared order.
    pub fn remaining(&self, completed: &BTreeSet<String>) -> Vec<String> {
        self.graph
            .tasks
            .iter()
            .filter(|t| !completed.contains(&t.id))
            .map(|t| t.id.clone())
            .collect()
    }

    /// True when every task is in `completed`.
    pub fn is_complete(&self, completed: &BTreeSet<String>) -> bool {
        self.graph.tasks.iter().all(|t| completed.contains(&t.id))
    }

    /// The wave partition a run starting from nothing would follow.
    pub fn planned_waves(&self) -> Vec<Vec<String>> {
        let mut completed = BTreeSet::new();
        let mut waves = Vec::new();
        loop {
            let wave: Vec<String> = self
                .ready_set(&completed)
                .into_iter()
                .map(|t| t.id.clone())
                .collect();
            if wave.is_empty() {
                break;
            }
            completed.extend(wave.iter().cloned());
            waves.push(wave);
        }
        waves
    }

    /// Output paths declared by more than one task.
    pub fn shared_outputs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut shared = BTreeSet::new();
        for path in self.graph.tasks.iter().flat_map(|t| t.output_paths.iter()) {
            if !seen.insert(path.as_str()) {
                shared.insert(path.clone());
            }
        }
        shared.into_iter().collect()
    }
}
