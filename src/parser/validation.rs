// ABOUTME: Hopfile validation logic and task reference checking
// ABOUTME: Reports unknown references, cycles, empty commands and template errors before a run

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::error::ValidationError;
use super::hopfile::Hopfile;
use super::task::{Step, TaskEntry};
use crate::template::TemplateEngine;

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

pub struct HopfileValidator {
    strict_mode: bool,
    target_override: bool,
}

impl HopfileValidator {
    pub fn new() -> Self {
        Self {
            strict_mode: false,
            target_override: false,
        }
    }

    /// Treat warnings as errors
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// A target will be supplied from outside the hopfile (command-line flags)
    pub fn with_target_override(mut self, has_target: bool) -> Self {
        self.target_override = has_target;
        self
    }

    /// Validate a complete hopfile
    pub fn validate(&self, hopfile: &Hopfile) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.validate_references(hopfile, &mut report);
        self.validate_cycles(hopfile, &mut report);
        self.validate_steps(hopfile, &mut report);
        self.validate_templates(hopfile, &mut report);
        self.validate_target(hopfile, &mut report);

        report.is_valid = report.errors.is_empty() && !(self.strict_mode && report.has_warnings());
        report
    }

    fn validate_references(&self, hopfile: &Hopfile, report: &mut ValidationReport) {
        for (name, task) in &hopfile.tasks {
            for reference in task.references() {
                if !hopfile.has_task(reference) {
                    report.errors.push(ValidationError::UnknownReference {
                        task: name.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
    }

    /// Detect reference cycles with strongly connected components
    fn validate_cycles(&self, hopfile: &Hopfile, report: &mut ValidationReport) {
        let mut graph = DiGraph::<String, ()>::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for name in hopfile.tasks.keys() {
            nodes.insert(name.as_str(), graph.add_node(name.clone()));
        }

        for (name, task) in &hopfile.tasks {
            let from = nodes[name.as_str()];
            for reference in task.references() {
                if let Some(&to) = nodes.get(reference) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        for component in tarjan_scc(&graph) {
            let is_cycle = component.len() > 1
                || graph.contains_edge(component[0], component[0]);
            if is_cycle {
                let mut tasks: Vec<String> =
                    component.iter().map(|&node| graph[node].clone()).collect();
                tasks.sort();
                report
                    .errors
                    .push(ValidationError::CyclicReference { tasks });
            }
        }
    }

    fn validate_steps(&self, hopfile: &Hopfile, report: &mut ValidationReport) {
        for (name, task) in &hopfile.tasks {
            if task.steps.is_empty() {
                report
                    .warnings
                    .push(format!("Task '{}' has no steps and will do nothing", name));
            }

            for (index, entry) in task.steps.iter().enumerate() {
                let TaskEntry::Step(step) = entry else {
                    continue;
                };

                if step.command.trim().is_empty() {
                    report.errors.push(ValidationError::EmptyCommand {
                        task: name.clone(),
                        index,
                    });
                }

                if step.timeout.is_some_and(|t| t.is_zero()) {
                    report.errors.push(ValidationError::ZeroTimeout {
                        task: name.clone(),
                        index,
                    });
                }

                if step.interactive && step.is_remote() {
                    report.warnings.push(format!(
                        "Step {} of task '{}' is marked interactive; remote steps always capture output",
                        index, name
                    ));
                }
            }
        }
    }

    fn validate_templates(&self, hopfile: &Hopfile, report: &mut ValidationReport) {
        for (key, value) in &hopfile.variables {
            self.check_template(&format!("variables.{}", key), value, report);
        }

        for (name, task) in &hopfile.tasks {
            for (index, entry) in task.steps.iter().enumerate() {
                if let TaskEntry::Step(step) = entry {
                    self.check_step_templates(name, index, step, report);
                }
            }
        }
    }

    fn check_step_templates(
        &self,
        task: &str,
        index: usize,
        step: &Step,
        report: &mut ValidationReport,
    ) {
        let prefix = format!("tasks.{}.steps[{}]", task, index);
        self.check_template(&format!("{}.{}", prefix, step.kind), &step.command, report);
        if let Some(ref dir) = step.working_dir {
            self.check_template(&format!("{}.dir", prefix), dir, report);
        }
        for (key, value) in &step.env {
            self.check_template(&format!("{}.env.{}", prefix, key), value, report);
        }
    }

    fn check_template(&self, field: &str, template: &str, report: &mut ValidationReport) {
        if let Err(error) = TemplateEngine::check_syntax(template) {
            report.errors.push(ValidationError::InvalidTemplate {
                field: field.to_string(),
                error: error.to_string(),
            });
        }
    }

    fn validate_target(&self, hopfile: &Hopfile, report: &mut ValidationReport) {
        if hopfile.target.is_some() || self.target_override {
            return;
        }

        for (name, task) in &hopfile.tasks {
            if task.own_steps().any(Step::is_remote) {
                report.warnings.push(
                    ValidationError::MissingTarget { task: name.clone() }.to_string()
                        + "; pass --host and --user",
                );
            }
        }
    }
}

impl Default for HopfileValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
