// ABOUTME: CLI module for the taskhop task runner
// ABOUTME: Exports command line interface components and main application logic

pub mod app;
pub mod args;
pub mod commands;
pub mod config;

pub use app::App;
pub use args::{Args, Commands, TargetArgs};
pub use commands::exit_code_for;
pub use config::Config;
