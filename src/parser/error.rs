// ABOUTME: Error types for hopfile parsing and validation
// ABOUTME: Defines specific error types for parser module operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read hopfile: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid hopfile format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Cyclic task references: {tasks:?}")]
    CyclicReference { tasks: Vec<String> },

    #[error("Task '{task}' references unknown task '{reference}'")]
    UnknownReference { task: String, reference: String },

    #[error("Step {index} of task '{task}' has an empty command")]
    EmptyCommand { task: String, index: usize },

    #[error("Step {index} of task '{task}' has a zero timeout")]
    ZeroTimeout { task: String, index: usize },

    #[error("Invalid template syntax in '{field}': {error}")]
    InvalidTemplate { field: String, error: String },

    #[error("Invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error("Task '{task}' runs remote steps but no target is configured")]
    MissingTarget { task: String },

    #[error("Empty hopfile: no tasks defined")]
    EmptyHopfile,
}

pub type Result<T> = std::result::Result<T, ParserError>;
