// ABOUTME: Task execution engine for taskhop
// ABOUTME: Handles task registration and resolution, step execution and fail-fast runs

pub mod error;
pub mod executor;
pub mod registry;
pub mod result;
pub mod runner;

pub use error::{ExecutionError, Result};
pub use executor::{CommandExecutor, DEFAULT_SHELL};
pub use registry::{ResolvedStep, TaskRegistry};
pub use result::{RunResult, RunState, StepStatus, TaskResult};
pub use runner::TaskRunner;
