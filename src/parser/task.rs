// ABOUTME: Task and step definitions as declared in a hopfile
// ABOUTME: Parses local, remote and nested-task entries into typed steps

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Local,
    Remote,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Local => "local",
            StepKind::Remote => "remote",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One local or remote shell command with its execution settings
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub command: String,
    pub working_dir: Option<String>,
    pub env: IndexMap<String, String>,
    pub timeout: Option<Duration>,
    /// Inherit the terminal instead of capturing output (e.g. `git add -p`)
    pub interactive: bool,
}

impl Step {
    fn new(kind: StepKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            working_dir: None,
            env: IndexMap::new(),
            timeout: None,
            interactive: false,
        }
    }

    pub fn local(command: impl Into<String>) -> Self {
        Self::new(StepKind::Local, command)
    }

    pub fn remote(command: impl Into<String>) -> Self {
        Self::new(StepKind::Remote, command)
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn as_interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn is_remote(&self) -> bool {
        self.kind == StepKind::Remote
    }
}

/// An entry in a task's step list: a command, or a reference to another task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub enum TaskEntry {
    Step(Step),
    Task(String),
}

impl TaskEntry {
    pub fn reference(task: impl Into<String>) -> Self {
        TaskEntry::Task(task.into())
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            TaskEntry::Task(name) => Some(name),
            TaskEntry::Step(_) => None,
        }
    }

    pub fn as_step(&self) -> Option<&Step> {
        match self {
            TaskEntry::Step(step) => Some(step),
            TaskEntry::Task(_) => None,
        }
    }
}

impl From<Step> for TaskEntry {
    fn from(step: Step) -> Self {
        TaskEntry::Step(step)
    }
}

/// On-disk shape of a task entry. Exactly one of `local`, `remote` or `task` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task: Option<String>,
    #[serde(default, alias = "working_dir", skip_serializing_if = "Option::is_none")]
    dir: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    env: IndexMap<String, String>,
    #[serde(
        with = "humantime_serde",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "is_false")]
    interactive: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the names a shell can `export`
fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl TryFrom<RawEntry> for TaskEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let (kind, command) = match (raw.local, raw.remote, raw.task) {
            (Some(command), None, None) => (StepKind::Local, command),
            (None, Some(command), None) => (StepKind::Remote, command),
            (None, None, Some(task)) => {
                if raw.dir.is_some()
                    || !raw.env.is_empty()
                    || raw.timeout.is_some()
                    || raw.interactive
                {
                    return Err(format!(
                        "task reference '{}' cannot set dir, env, timeout or interactive",
                        task
                    ));
                }
                return Ok(TaskEntry::Task(task));
            }
            (None, None, None) => {
                return Err("entry must set one of 'local', 'remote' or 'task'".to_string())
            }
            _ => {
                return Err(
                    "entry must set only one of 'local', 'remote' or 'task'".to_string(),
                )
            }
        };

        if let Some(name) = raw.env.keys().find(|name| !is_env_name(name)) {
            return Err(format!("'{}' is not a valid environment variable name", name));
        }

        Ok(TaskEntry::Step(Step {
            kind,
            command,
            working_dir: raw.dir,
            env: raw.env,
            timeout: raw.timeout,
            interactive: raw.interactive,
        }))
    }
}

impl From<TaskEntry> for RawEntry {
    fn from(entry: TaskEntry) -> Self {
        match entry {
            TaskEntry::Task(task) => RawEntry {
                task: Some(task),
                ..Default::default()
            },
            TaskEntry::Step(step) => {
                let (local, remote) = match step.kind {
                    StepKind::Local => (Some(step.command), None),
                    StepKind::Remote => (None, Some(step.command)),
                };
                RawEntry {
                    local,
                    remote,
                    task: None,
                    dir: step.working_dir,
                    env: step.env,
                    timeout: step.timeout,
                    interactive: step.interactive,
                }
            }
        }
    }
}

/// A named task: an ordered list of steps and task references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<TaskEntry>,
}

impl TaskDefinition {
    pub fn new(steps: Vec<TaskEntry>) -> Self {
        Self {
            description: None,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Names of the tasks this task refers to, in declaration order
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(TaskEntry::as_reference)
    }

    /// Commands declared directly by this task
    pub fn own_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter_map(TaskEntry::as_step)
    }
}
