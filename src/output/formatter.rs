// ABOUTME: Output formatters for task results and dry-run plans (text, JSON, YAML)
// ABOUTME: Handles serialization and presentation of run results

use async_trait::async_trait;
use serde_json::{self, Value as JsonValue};

use super::config::OutputOptions;
use super::error::{OutputError, Result};
use crate::engine::{ResolvedStep, RunResult, StepStatus, TaskResult};

#[async_trait]
pub trait OutputFormatter: Send + Sync {
    async fn format_task_result(&self, result: &TaskResult, options: &OutputOptions)
        -> Result<String>;

    async fn format_plan(&self, task: &str, steps: &[ResolvedStep]) -> Result<String>;
}

pub struct JsonFormatter {
    pretty: bool,
}

pub struct YamlFormatter;

pub struct TextFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }

    fn serialize(&self, value: &JsonValue, options: &OutputOptions) -> Result<String> {
        if self.pretty || options.pretty_print {
            serde_json::to_string_pretty(value).map_err(OutputError::SerializationError)
        } else {
            serde_json::to_string(value).map_err(OutputError::SerializationError)
        }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputFormatter for JsonFormatter {
    async fn format_task_result(
        &self,
        result: &TaskResult,
        options: &OutputOptions,
    ) -> Result<String> {
        let value = prepare_task_output(result, options)?;
        self.serialize(&value, options)
    }

    async fn format_plan(&self, task: &str, steps: &[ResolvedStep]) -> Result<String> {
        let value = prepare_plan_output(task, steps);
        self.serialize(&value, &OutputOptions::default())
    }
}

/// Structured form of a task result shared by the JSON and YAML formatters
fn prepare_task_output(result: &TaskResult, options: &OutputOptions) -> Result<JsonValue> {
    let mut output = serde_json::Map::new();

    output.insert("task".to_string(), JsonValue::String(result.task.clone()));
    output.insert("run_id".to_string(), JsonValue::String(result.run_id.clone()));
    output.insert(
        "target".to_string(),
        result
            .target
            .clone()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    );
    output.insert("state".to_string(), JsonValue::String(result.state.to_string()));
    output.insert("success".to_string(), JsonValue::Bool(result.success));
    output.insert("exit_code".to_string(), JsonValue::from(result.exit_code()));

    if options.include_timestamps {
        output.insert(
            "start_time".to_string(),
            JsonValue::String(result.start_time.to_rfc3339()),
        );
        if let Some(end_time) = result.end_time {
            output.insert(
                "end_time".to_string(),
                JsonValue::String(end_time.to_rfc3339()),
            );
        }
    }

    if let Some(duration) = result.duration {
        output.insert(
            "duration_seconds".to_string(),
            JsonValue::from(duration.as_secs_f64()),
        );
    }

    if let Some(ref error) = result.error {
        output.insert("error".to_string(), JsonValue::String(error.clone()));
    }

    let steps = result
        .steps
        .iter()
        .map(|step| prepare_step_output(step, options))
        .collect::<Result<Vec<_>>>()?;
    output.insert("steps".to_string(), JsonValue::Array(steps));

    Ok(JsonValue::Object(output))
}

fn prepare_step_output(step: &RunResult, options: &OutputOptions) -> Result<JsonValue> {
    let mut value = serde_json::to_value(step)?;

    if let Some(object) = value.as_object_mut() {
        object.insert(
            "duration_seconds".to_string(),
            JsonValue::from(step.duration.as_secs_f64()),
        );
        object.remove("duration");

        if !options.include_timestamps {
            object.remove("start_time");
        }

        if options.include_output {
            for stream in ["stdout", "stderr"] {
                if let Some(JsonValue::String(text)) = object.get_mut(stream) {
                    *text = truncate(text, options.max_output_length);
                }
            }
        } else {
            object.remove("stdout");
            object.remove("stderr");
        }
    }

    Ok(value)
}

fn prepare_plan_output(task: &str, steps: &[ResolvedStep]) -> JsonValue {
    let steps = steps
        .iter()
        .map(|resolved| {
            let step = &resolved.step;
            serde_json::json!({
                "step": resolved.label(),
                "kind": step.kind.as_str(),
                "command": step.command,
                "dir": step.working_dir,
                "env": step.env,
                "timeout_seconds": step.timeout.map(|t| t.as_secs_f64()),
                "interactive": step.interactive,
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({ "task": task, "steps": steps })
}

/// Cut `text` to at most `max` bytes on a character boundary
fn truncate(text: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if text.len() > max => {
            let mut end = max;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... [truncated]", &text[..end])
        }
        _ => text.to_string(),
    }
}

impl YamlFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YamlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputFormatter for YamlFormatter {
    async fn format_task_result(
        &self,
        result: &TaskResult,
        options: &OutputOptions,
    ) -> Result<String> {
        let value = prepare_task_output(result, options)?;
        serde_yaml::to_string(&value).map_err(OutputError::YamlSerializationError)
    }

    async fn format_plan(&self, task: &str, steps: &[ResolvedStep]) -> Result<String> {
        serde_yaml::to_string(&prepare_plan_output(task, steps))
            .map_err(OutputError::YamlSerializationError)
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }

    fn format_step(&self, step: &RunResult, options: &OutputOptions) -> String {
        let icon = match step.status {
            StepStatus::Success => "✓",
            StepStatus::Failed => "✗",
            StepStatus::TimedOut => "⧖",
        };

        let mut output = format!(
            "{} {} {} `{}` on {}",
            icon,
            step.step,
            step.kind,
            step.command,
            step.location()
        );

        match (step.status, step.exit_code) {
            (StepStatus::Success, _) => {}
            (StepStatus::TimedOut, _) => output.push_str(" (timed out)"),
            (StepStatus::Failed, Some(code)) => output.push_str(&format!(" (exit {})", code)),
            (StepStatus::Failed, None) => output.push_str(" (no exit status)"),
        }
        output.push_str(&format!(" [{:.2}s]", step.duration.as_secs_f64()));

        if options.include_output && !step.is_successful() {
            let stderr = truncate(step.stderr.trim_end(), options.max_output_length);
            if !stderr.is_empty() {
                output.push_str(&format!("\n    stderr: {}", stderr.replace('\n', "\n    ")));
            }
        }

        output
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputFormatter for TextFormatter {
    async fn format_task_result(
        &self,
        result: &TaskResult,
        options: &OutputOptions,
    ) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!("Task: {} ({})\n", result.task, result.run_id));
        if let Some(ref target) = result.target {
            output.push_str(&format!("Target: {}\n", target));
        }
        output.push_str(&format!("State: {}\n", result.state));

        if options.include_timestamps {
            output.push_str(&format!(
                "Started: {}\n",
                result.start_time.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        if let Some(duration) = result.duration {
            output.push_str(&format!("Duration: {:.2}s\n", duration.as_secs_f64()));
        }

        if !result.steps.is_empty() {
            output.push_str("\nSteps:\n");
            for step in &result.steps {
                for line in self.format_step(step, options).lines() {
                    output.push_str(&format!("  {}\n", line));
                }
            }
        }

        if let Some(ref error) = result.error {
            output.push_str(&format!("\nError: {}\n", error));
        }

        Ok(output)
    }

    async fn format_plan(&self, task: &str, steps: &[ResolvedStep]) -> Result<String> {
        let mut output = format!("Plan for task '{}' ({} steps):\n", task, steps.len());

        for resolved in steps {
            let step = &resolved.step;
            output.push_str(&format!(
                "  {} {}: {}\n",
                resolved.label(),
                step.kind,
                step.command
            ));
            if let Some(ref dir) = step.working_dir {
                output.push_str(&format!("      dir: {}\n", dir));
            }
            for (key, value) in &step.env {
                output.push_str(&format!("      env: {}={}\n", key, value));
            }
            if let Some(timeout) = step.timeout {
                output.push_str(&format!("      timeout: {:?}\n", timeout));
            }
            if step.interactive {
                output.push_str("      interactive\n");
            }
        }

        Ok(output)
    }
}
