// ABOUTME: Template context holding variables, environment, target and run information
// ABOUTME: Serialized to JSON and handed to handlebars when rendering step fields

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::env;

use super::error::{Result, TemplateError};
use crate::session::Target;

#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub variables: IndexMap<String, String>,
    pub env: HashMap<String, String>,
    pub target: Option<Target>,
    pub hopfile: String,
    pub run: RunInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub task: String,
    pub started_at: DateTime<Utc>,
}

impl TemplateContext {
    /// Create a context with the process environment captured
    pub fn new(variables: IndexMap<String, String>) -> Self {
        Self {
            variables,
            env: env::vars().collect(),
            target: None,
            hopfile: String::new(),
            run: RunInfo::default(),
        }
    }

    pub fn with_target(mut self, target: Option<&Target>) -> Self {
        self.target = target.cloned();
        self
    }

    pub fn with_hopfile(mut self, name: impl Into<String>) -> Self {
        self.hopfile = name.into();
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>, task: impl Into<String>) -> Self {
        self.run = RunInfo {
            id: run_id.into(),
            task: task.into(),
            started_at: Utc::now(),
        };
        self
    }

    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    /// Convert context to JSON for handlebars rendering
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(TemplateError::JsonError)
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task: String::new(),
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_json_conversion() {
        let mut variables = IndexMap::new();
        variables.insert("code_dir".to_string(), "~/6.824".to_string());

        let target = Target::new("athena.dialup.mit.edu", "student");
        let context = TemplateContext::new(variables)
            .with_target(Some(&target))
            .with_hopfile("labs")
            .with_run("run-1", "deploy");

        let json = context.to_json().unwrap();
        assert_eq!(json["variables"]["code_dir"], "~/6.824");
        assert_eq!(json["target"]["host"], "athena.dialup.mit.edu");
        assert_eq!(json["target"]["user"], "student");
        assert_eq!(json["hopfile"], "labs");
        assert_eq!(json["run"]["task"], "deploy");
        assert!(json["env"].is_object());
    }

    #[test]
    fn test_context_without_target() {
        let context = TemplateContext::new(IndexMap::new());
        let json = context.to_json().unwrap();
        assert!(json["target"].is_null());
        assert!(!context.run.id.is_empty());
    }
}
