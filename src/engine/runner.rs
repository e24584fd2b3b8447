// ABOUTME: Task runner resolving a task and executing its steps in order against one target
// ABOUTME: Fail-fast execution with a single scoped session, cancellation and dry-run planning

use chrono::Utc;
use indexmap::IndexMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::{ExecutionError, Result};
use super::executor::CommandExecutor;
use super::registry::{ResolvedStep, TaskRegistry};
use super::result::{RunResult, RunState, TaskResult};
use crate::parser::{Hopfile, StepKind};
use crate::session::{SessionConnector, SessionScope, Target};
use crate::template::{TemplateContext, TemplateEngine};

pub struct TaskRunner {
    registry: TaskRegistry,
    executor: CommandExecutor,
    connector: Arc<dyn SessionConnector>,
    templates: TemplateEngine,
    variables: IndexMap<String, String>,
    hopfile: String,
}

impl TaskRunner {
    pub fn new(registry: TaskRegistry, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            registry,
            executor: CommandExecutor::new(),
            connector,
            templates: TemplateEngine::new(),
            variables: IndexMap::new(),
            hopfile: String::new(),
        }
    }

    /// Build a runner over every task and variable in a hopfile
    pub fn from_hopfile(hopfile: &Hopfile, connector: Arc<dyn SessionConnector>) -> Result<Self> {
        let registry = TaskRegistry::from_hopfile(hopfile)?;
        Ok(Self::new(registry, connector)
            .with_variables(hopfile.variables.clone())
            .with_hopfile_name(hopfile.name.clone()))
    }

    pub fn with_executor(mut self, executor: CommandExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_variables(mut self, variables: IndexMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_hopfile_name(mut self, name: impl Into<String>) -> Self {
        self.hopfile = name.into();
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Resolved and rendered steps of a task, without running anything
    pub fn plan(&self, task: &str, target: Option<&Target>) -> Result<Vec<ResolvedStep>> {
        self.render_plan(task, target, &Uuid::new_v4().to_string())
    }

    fn render_plan(
        &self,
        task: &str,
        target: Option<&Target>,
        run_id: &str,
    ) -> Result<Vec<ResolvedStep>> {
        let steps = self.registry.resolve(task)?;

        let mut context = TemplateContext::new(self.variables.clone())
            .with_target(target)
            .with_hopfile(self.hopfile.clone())
            .with_run(run_id, task);
        context.variables = self
            .templates
            .resolve_variables(&self.variables, &context)?;
        let context = context.to_json()?;

        steps
            .into_iter()
            .map(|resolved| {
                let step = self.templates.render_step(&resolved.step, &context)?;
                Ok(ResolvedStep { step, ..resolved })
            })
            .collect()
    }

    /// Run a task to completion
    pub async fn run(&self, task: &str, target: Option<Target>) -> Result<TaskResult> {
        self.run_until(task, target, std::future::pending::<()>()).await
    }

    /// Run a task, abandoning the in-flight step when `shutdown` completes.
    ///
    /// Resolution, template and configuration errors are returned as `Err`
    /// before any command runs. Once execution starts, failures end up in the
    /// returned [`TaskResult`].
    #[instrument(skip(self, target, shutdown), fields(task = %task))]
    pub async fn run_until<F>(
        &self,
        task: &str,
        target: Option<Target>,
        shutdown: F,
    ) -> Result<TaskResult>
    where
        F: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4().to_string();
        let mut state = advance(&run_id, RunState::Idle, RunState::Resolving)?;

        let steps = self.render_plan(task, target.as_ref(), &run_id)?;
        if target.is_none() {
            if let Some(remote) = steps.iter().find(|s| s.step.is_remote()) {
                return Err(ExecutionError::ConfigurationError(format!(
                    "step {} runs remotely but no target is configured",
                    remote.label()
                )));
            }
        }

        state = advance(&run_id, state, RunState::Executing)?;
        info!(
            "Running task '{}' ({} steps, run_id: {})",
            task,
            steps.len(),
            run_id
        );

        let mut result = TaskResult::new(
            task.to_string(),
            run_id.clone(),
            target.as_ref().map(ToString::to_string),
        );
        let mut scope = SessionScope::new(Arc::clone(&self.connector), target);
        let mut failure = None;

        tokio::pin!(shutdown);
        for resolved in &steps {
            let start_time = Utc::now();
            let started = Instant::now();
            let outcome = tokio::select! {
                outcome = self.executor.execute(resolved, &mut scope) => outcome,
                _ = &mut shutdown => {
                    warn!("Cancelled during {}", resolved.label());
                    failure = Some(ExecutionError::Cancelled { step: resolved.label() });
                    break;
                }
            };

            match outcome {
                Ok(step_result) => {
                    let step_failure = step_result.failure();
                    result.add_step_result(step_result);
                    if step_failure.is_some() {
                        failure = step_failure;
                        break;
                    }
                }
                Err(error) => {
                    let target = match resolved.step.kind {
                        StepKind::Local => None,
                        StepKind::Remote => scope.target().map(ToString::to_string),
                    };
                    result.add_step_result(RunResult::not_run(
                        resolved,
                        target,
                        &error,
                        start_time,
                        started.elapsed(),
                    ));
                    failure = Some(error);
                    break;
                }
            }
        }

        if let Err(e) = scope.close().await {
            warn!("Failed to close session: {}", e);
        }

        let next = if failure.is_some() {
            RunState::Failed
        } else {
            RunState::Succeeded
        };
        advance(&run_id, state, next)?;

        match &failure {
            None => info!("Task '{}' succeeded", task),
            Some(error) => warn!("Task '{}' failed: {}", task, error),
        }
        result.mark_completed(failure);

        Ok(result)
    }
}

fn advance(run_id: &str, from: RunState, to: RunState) -> Result<RunState> {
    let next = from.transition(to)?;
    debug!("Run {} state {} -> {}", run_id, from, next);
    Ok(next)
}
