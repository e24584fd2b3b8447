// ABOUTME: Main library module for the taskhop remote task runner
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod output;
pub mod parser;
pub mod session;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{ExecutionError, RunResult, TaskRegistry, TaskResult, TaskRunner};
pub use output::{OutputFormat, OutputHandler};
pub use parser::{Hopfile, HopfileParser, HopfileValidator, Step, TaskDefinition, TaskEntry};
pub use session::{RemoteSession, SessionConnector, Target};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
