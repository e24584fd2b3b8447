// ABOUTME: Step and task result types plus the run state machine
// ABOUTME: Defines per-step RunResults and their aggregation into a TaskResult

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::ExecutionError;
use super::registry::ResolvedStep;
use crate::parser::StepKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    TimedOut,
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// `task[index]` label of the step
    pub step: String,
    pub kind: StepKind,
    pub command: String,
    /// Remote target, `None` for local steps
    pub target: Option<String>,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    /// Limit that expired, for timed-out steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl RunResult {
    pub fn is_successful(&self) -> bool {
        self.status == StepStatus::Success
    }

    /// Failed result for a step that could not be run to an exit status,
    /// e.g. because the connection or the spawn failed
    pub fn not_run(
        resolved: &ResolvedStep,
        target: Option<String>,
        error: &ExecutionError,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            step: resolved.label(),
            kind: resolved.step.kind,
            command: resolved.step.command.clone(),
            target,
            status: StepStatus::Failed,
            exit_code: None,
            stdout: String::new(),
            stderr: error.to_string(),
            start_time,
            duration,
            timeout: None,
        }
    }

    /// Where the step ran, for messages
    pub fn location(&self) -> &str {
        self.target.as_deref().unwrap_or("localhost")
    }

    /// The error this result represents, if it is not a success
    pub fn failure(&self) -> Option<ExecutionError> {
        match self.status {
            StepStatus::Success => None,
            StepStatus::TimedOut => Some(ExecutionError::Timeout {
                step: self.step.clone(),
                target: self.location().to_string(),
                timeout: self.timeout.unwrap_or(self.duration),
            }),
            StepStatus::Failed => Some(match self.exit_code {
                Some(exit_code) => ExecutionError::CommandFailed {
                    step: self.step.clone(),
                    target: self.location().to_string(),
                    exit_code,
                    stderr: self.stderr.clone(),
                },
                None => ExecutionError::Killed {
                    step: self.step.clone(),
                    target: self.location().to_string(),
                },
            }),
        }
    }
}

/// Runner state machine: `Idle -> Resolving -> Executing -> {Succeeded | Failed}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Resolving,
    Executing,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Executing)
                | (Resolving, Failed)
                | (Executing, Succeeded)
                | (Executing, Failed)
        )
    }

    /// Move to `next`, rejecting transitions the machine does not have
    pub fn transition(self, next: RunState) -> Result<RunState, ExecutionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ExecutionError::ConfigurationError(format!(
                "invalid run state transition {} -> {}",
                self, next
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Result of running one task: its executed steps in order plus the outcome
#[derive(Debug, Serialize)]
pub struct TaskResult {
    pub task: String,
    pub run_id: String,
    pub target: Option<String>,
    pub state: RunState,
    pub success: bool,
    pub steps: Vec<RunResult>,
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<ExecutionError>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
}

impl TaskResult {
    pub fn new(task: String, run_id: String, target: Option<String>) -> Self {
        Self {
            task,
            run_id,
            target,
            state: RunState::Executing,
            success: false,
            steps: Vec::new(),
            error: None,
            failure: None,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
        }
    }

    pub fn add_step_result(&mut self, result: RunResult) {
        self.steps.push(result);
    }

    /// Close the result as succeeded, or failed with `failure`
    pub fn mark_completed(&mut self, failure: Option<ExecutionError>) {
        let end = Utc::now();
        self.end_time = Some(end);
        self.duration = Some((end - self.start_time).to_std().unwrap_or(Duration::ZERO));

        match failure {
            None => {
                self.state = RunState::Succeeded;
                self.success = self.steps.iter().all(RunResult::is_successful);
            }
            Some(error) => {
                self.state = RunState::Failed;
                self.success = false;
                self.error = Some(error.to_string());
                self.failure = Some(error);
            }
        }
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn failed_step(&self) -> Option<&RunResult> {
        self.steps.iter().find(|s| !s.is_successful())
    }

    /// Exit code the CLI reports for this result
    pub fn exit_code(&self) -> u8 {
        match (&self.failure, self.success) {
            (Some(error), _) => error.exit_code(),
            (None, true) => 0,
            (None, false) => 1,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Resolving => write!(f, "resolving"),
            RunState::Executing => write!(f, "executing"),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_result(step: &str, status: StepStatus, exit_code: Option<i32>) -> RunResult {
        RunResult {
            step: step.to_string(),
            kind: StepKind::Remote,
            command: "go test".to_string(),
            target: Some("u@example.edu".to_string()),
            status,
            exit_code,
            stdout: String::new(),
            stderr: "FAIL".to_string(),
            start_time: Utc::now(),
            duration: Duration::from_millis(5),
            timeout: None,
        }
    }

    #[test]
    fn test_state_machine_transitions() {
        assert!(RunState::Idle.can_transition_to(RunState::Resolving));
        assert!(RunState::Resolving.can_transition_to(RunState::Executing));
        assert!(RunState::Executing.can_transition_to(RunState::Failed));
        assert!(!RunState::Idle.can_transition_to(RunState::Executing));
        assert!(!RunState::Failed.can_transition_to(RunState::Executing));
        assert!(!RunState::Succeeded.can_transition_to(RunState::Resolving));
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.transition(RunState::Idle).is_err());
    }

    #[test]
    fn test_failure_from_step_status() {
        let failed = step_result("deploy[1]", StepStatus::Failed, Some(1));
        assert!(matches!(
            failed.failure(),
            Some(ExecutionError::CommandFailed { exit_code: 1, .. })
        ));

        let killed = step_result("deploy[1]", StepStatus::Failed, None);
        assert!(matches!(killed.failure(), Some(ExecutionError::Killed { .. })));

        let mut timed_out = step_result("deploy[1]", StepStatus::TimedOut, None);
        timed_out.timeout = Some(Duration::from_secs(2));
        assert!(matches!(
            timed_out.failure(),
            Some(ExecutionError::Timeout { timeout, .. }) if timeout == Duration::from_secs(2)
        ));

        assert!(step_result("deploy[0]", StepStatus::Success, Some(0))
            .failure()
            .is_none());
    }

    #[test]
    fn test_task_result_lifecycle() {
        let mut result = TaskResult::new("deploy".to_string(), "run-1".to_string(), None);
        result.add_step_result(step_result("deploy[0]", StepStatus::Success, Some(0)));
        result.mark_completed(None);

        assert_eq!(result.state, RunState::Succeeded);
        assert!(result.is_successful());
        assert_eq!(result.exit_code(), 0);
        assert!(result.duration.is_some());
    }

    #[test]
    fn test_task_result_failure() {
        let mut result = TaskResult::new("deploy".to_string(), "run-1".to_string(), None);
        result.add_step_result(step_result("deploy[0]", StepStatus::Success, Some(0)));
        let failing = step_result("deploy[1]", StepStatus::Failed, Some(1));
        let failure = failing.failure();
        result.add_step_result(failing);
        result.mark_completed(failure);

        assert_eq!(result.state, RunState::Failed);
        assert!(!result.is_successful());
        assert_eq!(result.exit_code(), 4);
        assert_eq!(result.failed_step().unwrap().step, "deploy[1]");
        assert!(result.error.as_ref().unwrap().contains("deploy[1]"));
    }

    #[test]
    fn test_empty_task_result_succeeds() {
        let mut result = TaskResult::new("noop".to_string(), "run-1".to_string(), None);
        result.mark_completed(None);
        assert!(result.is_successful());
        assert!(result.steps.is_empty());
    }
}
