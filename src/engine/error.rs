// ABOUTME: Error types for task resolution and execution
// ABOUTME: Defines the run error taxonomy and its mapping to process exit codes

use std::time::Duration;
use thiserror::Error;

use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    #[error("Step {step} failed on {target} with exit code {exit_code}{}", stderr_suffix(.stderr))]
    CommandFailed {
        step: String,
        target: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Step {step} on {target} was terminated by a signal")]
    Killed { step: String, target: String },

    #[error("Unknown task: '{task}'{}", referenced_suffix(.referenced_by))]
    UnknownTask {
        task: String,
        referenced_by: Option<String>,
    },

    #[error("Cyclic task reference: {}", .path.join(" -> "))]
    CyclicTask { path: Vec<String> },

    #[error("Task '{task}' is already registered")]
    DuplicateTask { task: String },

    #[error("Step {step} timed out on {target} after {timeout:?}")]
    Timeout {
        step: String,
        target: String,
        timeout: Duration,
    },

    #[error("Run cancelled during step {step}")]
    Cancelled { step: String },

    #[error("Failed to launch step {step}: {source}")]
    Spawn {
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Template error: {0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("Parser error: {0}")]
    ParserError(#[from] crate::parser::ParserError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn referenced_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(task) => format!(" (referenced by '{}')", task),
        None => String::new(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

impl ExecutionError {
    /// Process exit code reported by the CLI for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            ExecutionError::Connection { .. } => 3,
            ExecutionError::CommandFailed { .. }
            | ExecutionError::Killed { .. }
            | ExecutionError::Spawn { .. } => 4,
            ExecutionError::UnknownTask { .. } => 5,
            ExecutionError::CyclicTask { .. } => 6,
            ExecutionError::Timeout { .. } => 7,
            ExecutionError::Cancelled { .. } => 130,
            ExecutionError::DuplicateTask { .. }
            | ExecutionError::ConfigurationError(_)
            | ExecutionError::TemplateError(_)
            | ExecutionError::ParserError(_) => 2,
            ExecutionError::IoError(_) => 1,
        }
    }

    /// Errors raised before any command ran
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            ExecutionError::UnknownTask { .. }
                | ExecutionError::CyclicTask { .. }
                | ExecutionError::DuplicateTask { .. }
                | ExecutionError::ConfigurationError(_)
                | ExecutionError::TemplateError(_)
                | ExecutionError::ParserError(_)
        )
    }
}

impl From<SessionError> for ExecutionError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NoTarget => ExecutionError::ConfigurationError(
                "no target configured for remote steps".to_string(),
            ),
            SessionError::Connect { target, message }
            | SessionError::Transport { target, message }
            | SessionError::Close { target, message } => {
                ExecutionError::Connection { target, message }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let connection = ExecutionError::Connection {
            target: "u@example.edu".to_string(),
            message: "Permission denied".to_string(),
        };
        let failed = ExecutionError::CommandFailed {
            step: "deploy[1]".to_string(),
            target: "u@example.edu".to_string(),
            exit_code: 1,
            stderr: String::new(),
        };
        let unknown = ExecutionError::UnknownTask {
            task: "nope".to_string(),
            referenced_by: None,
        };
        let cyclic = ExecutionError::CyclicTask {
            path: vec!["a".to_string(), "a".to_string()],
        };

        assert_eq!(connection.exit_code(), 3);
        assert_eq!(failed.exit_code(), 4);
        assert_eq!(unknown.exit_code(), 5);
        assert_eq!(cyclic.exit_code(), 6);
        assert!(unknown.is_configuration_defect());
        assert!(!failed.is_configuration_defect());
    }

    #[test]
    fn test_messages_name_step_and_target() {
        let failed = ExecutionError::CommandFailed {
            step: "deploy[1]".to_string(),
            target: "u@example.edu".to_string(),
            exit_code: 1,
            stderr: "FAIL paxos\n".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "Step deploy[1] failed on u@example.edu with exit code 1: FAIL paxos"
        );

        let cyclic = ExecutionError::CyclicTask {
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(cyclic.to_string(), "Cyclic task reference: a -> b -> a");

        let unknown = ExecutionError::UnknownTask {
            task: "push".to_string(),
            referenced_by: Some("prepare_deploy".to_string()),
        };
        assert_eq!(
            unknown.to_string(),
            "Unknown task: 'push' (referenced by 'prepare_deploy')"
        );
    }

    #[test]
    fn test_session_errors_map_to_connection() {
        let error: ExecutionError = SessionError::Connect {
            target: "u@example.edu".to_string(),
            message: "timed out".to_string(),
        }
        .into();
        assert!(matches!(error, ExecutionError::Connection { .. }));
        assert_eq!(error.exit_code(), 3);
    }
}
