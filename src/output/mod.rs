// ABOUTME: Output handler module for task result formatting and persistence
// ABOUTME: Formats results and plans as text, JSON or YAML and writes them to stdout or a file

pub mod config;
pub mod error;
pub mod formatter;
pub mod writer;

use std::collections::HashMap;

pub use self::config::{OutputConfig, OutputFormat, OutputOptions};
pub use self::error::{OutputError, Result};
use self::formatter::{JsonFormatter, OutputFormatter, TextFormatter, YamlFormatter};
use self::writer::{FileWriter, OutputWriter, StdoutWriter};
use crate::engine::{ResolvedStep, TaskResult};

pub struct OutputHandler {
    formatters: HashMap<OutputFormat, Box<dyn OutputFormatter>>,
}

impl OutputHandler {
    pub fn new() -> Self {
        let mut handler = Self {
            formatters: HashMap::new(),
        };

        handler.register_formatter(OutputFormat::Text, Box::new(TextFormatter::new()));
        handler.register_formatter(OutputFormat::Json, Box::new(JsonFormatter::new()));
        handler.register_formatter(OutputFormat::Yaml, Box::new(YamlFormatter::new()));

        handler
    }

    pub fn register_formatter(
        &mut self,
        format: OutputFormat,
        formatter: Box<dyn OutputFormatter>,
    ) {
        self.formatters.insert(format, formatter);
    }

    fn formatter(&self, format: OutputFormat) -> Result<&dyn OutputFormatter> {
        self.formatters
            .get(&format)
            .map(|formatter| &**formatter)
            .ok_or_else(|| OutputError::UnknownFormat {
                format: format.to_string(),
            })
    }

    fn writer(config: &OutputConfig) -> Box<dyn OutputWriter> {
        match config.destination {
            Some(ref path) => Box::new(FileWriter::new(path)),
            None => Box::new(StdoutWriter::new()),
        }
    }

    pub async fn output_task_result(
        &self,
        result: &TaskResult,
        config: &OutputConfig,
    ) -> Result<()> {
        let formatted = self
            .formatter(config.format)?
            .format_task_result(result, &config.options)
            .await?;
        Self::writer(config).write(&formatted).await
    }

    pub async fn output_plan(
        &self,
        task: &str,
        steps: &[ResolvedStep],
        config: &OutputConfig,
    ) -> Result<()> {
        let formatted = self
            .formatter(config.format)?
            .format_plan(task, steps)
            .await?;
        Self::writer(config).write(&formatted).await
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
