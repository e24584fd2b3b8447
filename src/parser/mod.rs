// ABOUTME: Parser module for YAML hopfile definitions
// ABOUTME: Exports hopfile parsing, validation, and task/step data structures

pub mod error;
pub mod hopfile;
pub mod task;
pub mod validation;

pub use error::{ParserError, ValidationError};
pub use hopfile::{Hopfile, HopfileParser, TargetConfig, DEFAULT_HOPFILE_NAMES};
pub use task::{Step, StepKind, TaskDefinition, TaskEntry};
pub use validation::{HopfileValidator, ValidationReport};
