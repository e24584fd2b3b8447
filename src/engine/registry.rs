// ABOUTME: Task registry mapping names to ordered step and reference lists
// ABOUTME: Rejects duplicates and cycles at registration and flattens tasks into resolved steps

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use super::error::{ExecutionError, Result};
use crate::parser::{Hopfile, Step, TaskDefinition, TaskEntry};

/// A step flattened out of its declaring task
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    /// Task that declared the step
    pub task: String,
    /// Position of the step within that task's entries
    pub index: usize,
    pub step: Step,
}

impl ResolvedStep {
    /// Stable `task[index]` label used in results and error messages
    pub fn label(&self) -> String {
        format!("{}[{}]", self.task, self.index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: IndexMap<String, TaskDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every task of a hopfile in declaration order
    pub fn from_hopfile(hopfile: &Hopfile) -> Result<Self> {
        let mut registry = Self::new();
        for (name, task) in &hopfile.tasks {
            registry.register(name.clone(), task.clone())?;
        }
        Ok(registry)
    }

    /// Add a task. References to tasks that are not registered yet are
    /// accepted; a registration that closes a cycle is not.
    pub fn register(&mut self, name: impl Into<String>, task: TaskDefinition) -> Result<()> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(ExecutionError::DuplicateTask { task: name });
        }

        let mut path = vec![name.clone()];
        let mut visited = HashSet::new();
        for reference in task.references() {
            if self.reaches(reference, &name, &mut visited, &mut path) {
                path.push(name.clone());
                return Err(ExecutionError::CyclicTask { path });
            }
        }

        debug!("Registered task '{}' with {} entries", name, task.steps.len());
        self.tasks.insert(name, task);
        Ok(())
    }

    /// Depth-first search from `from` for `to`. On success `path` holds the
    /// chain of task names walked, excluding `to`.
    fn reaches<'a>(
        &'a self,
        from: &'a str,
        to: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<String>,
    ) -> bool {
        if from == to {
            return true;
        }
        if !visited.insert(from) {
            return false;
        }
        let Some(task) = self.tasks.get(from) else {
            return false;
        };

        path.push(from.to_string());
        for reference in task.references() {
            if self.reaches(reference, to, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Flatten a task into its steps, expanding references depth-first
    pub fn resolve(&self, name: &str) -> Result<Vec<ResolvedStep>> {
        let mut steps = Vec::new();
        let mut path = Vec::new();
        self.expand(name, None, &mut path, &mut steps)?;
        Ok(steps)
    }

    fn expand(
        &self,
        name: &str,
        referenced_by: Option<&str>,
        path: &mut Vec<String>,
        steps: &mut Vec<ResolvedStep>,
    ) -> Result<()> {
        if path.iter().any(|seen| seen == name) {
            let mut cycle = path.clone();
            cycle.push(name.to_string());
            return Err(ExecutionError::CyclicTask { path: cycle });
        }

        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownTask {
                task: name.to_string(),
                referenced_by: referenced_by.map(str::to_string),
            })?;

        path.push(name.to_string());
        for (index, entry) in task.steps.iter().enumerate() {
            match entry {
                TaskEntry::Step(step) => steps.push(ResolvedStep {
                    task: name.to_string(),
                    index,
                    step: step.clone(),
                }),
                TaskEntry::Task(reference) => self.expand(reference, Some(name), path, steps)?,
            }
        }
        path.pop();
        Ok(())
    }

    /// Check that every task resolves
    pub fn validate(&self) -> Result<()> {
        for name in self.tasks.keys() {
            self.resolve(name)?;
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
