// ABOUTME: Command implementations for the taskhop CLI
// ABOUTME: Handles the run, list, validate and init commands and maps errors to exit codes

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::args::{Args, TargetArgs};
use super::config::Config;
use crate::engine::{CommandExecutor, ExecutionError, TaskRunner};
use crate::output::{OutputConfig, OutputError, OutputFormat, OutputHandler};
use crate::parser::{
    Hopfile, HopfileParser, HopfileValidator, ParserError, TargetConfig, ValidationError,
    DEFAULT_HOPFILE_NAMES,
};
use crate::session::{OpenSshConnector, Target};
use crate::template::TemplateError;

/// Options of the `run` command
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub task: String,
    pub hopfile: Option<PathBuf>,
    pub target: TargetArgs,
    pub vars: Vec<String>,
    pub dry_run: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Run a task and report its result. Returns the process exit code.
pub async fn run_task(options: RunOptions, config: &Config) -> Result<u8> {
    let path = resolve_hopfile_path(options.hopfile.clone(), config)?;
    let mut hopfile = load_hopfile(&path).await?;

    let variables = Args::parse_variables(&options.vars)
        .map_err(|e| ExecutionError::ConfigurationError(e.to_string()))?;
    info!("Parsed {} template variables", variables.len());
    hopfile.merge_variables(variables);

    let target = build_target(&hopfile, &options.target, config)?;
    match target {
        Some(ref target) => info!("Target: {}", target),
        None => info!("No target configured; only local steps can run"),
    }

    let connector = OpenSshConnector::new()
        .with_known_hosts(config.known_hosts)
        .with_connect_timeout(config.connect_timeout);
    // Structured results on stdout must not be interleaved with step output
    let stdout_is_free = options.format == OutputFormat::Text || options.output.is_some();
    let executor = CommandExecutor::new()
        .with_shell(config.shell.clone())
        .with_default_timeout(config.default_timeout)
        .with_echo_output(config.echo_output && stdout_is_free);
    let runner =
        TaskRunner::from_hopfile(&hopfile, Arc::new(connector))?.with_executor(executor);

    let output_config = OutputConfig::new(options.format).with_destination(options.output);
    let handler = OutputHandler::new();

    if options.dry_run {
        let steps = runner.plan(&options.task, target.as_ref())?;
        handler
            .output_plan(&options.task, &steps, &output_config)
            .await?;
        info!("Dry run - no steps executed");
        return Ok(0);
    }

    let result = runner
        .run_until(&options.task, target, shutdown_signal())
        .await?;

    handler.output_task_result(&result, &output_config).await?;

    Ok(result.exit_code())
}

/// Print the tasks of a hopfile
pub async fn list_tasks(hopfile: Option<PathBuf>, config: &Config) -> Result<u8> {
    let path = resolve_hopfile_path(hopfile, config)?;
    let hopfile = load_hopfile(&path).await?;

    println!("Tasks in '{}' ({}):", hopfile.name, path.display());
    let width = hopfile.tasks.keys().map(String::len).max().unwrap_or(0);

    for (name, task) in &hopfile.tasks {
        let references: Vec<&str> = task.references().collect();
        let summary = match (task.steps.len(), references.len()) {
            (0, _) => "no steps".to_string(),
            (n, 0) => format!("{} step{}", n, if n == 1 { "" } else { "s" }),
            (n, r) if n == r => format!("-> {}", references.join(", ")),
            (n, _) => format!("{} entries, -> {}", n, references.join(", ")),
        };

        match task.description {
            Some(ref description) => {
                println!("  {:width$}  {}  ({})", name, description, summary, width = width)
            }
            None => println!("  {:width$}  {}", name, summary, width = width),
        }
    }

    Ok(0)
}

/// Validate a hopfile and print the report
pub async fn validate_hopfile(
    hopfile: Option<PathBuf>,
    strict: bool,
    with_target: bool,
    config: &Config,
) -> Result<u8> {
    let path = resolve_hopfile_path(hopfile, config)?;
    info!("Validating hopfile: {}", path.display());
    let hopfile = load_hopfile(&path).await?;

    let report = HopfileValidator::new()
        .with_strict_mode(strict)
        .with_target_override(with_target)
        .validate(&hopfile);

    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    for error in &report.errors {
        println!("  error: {}", error);
    }

    if report.is_valid {
        println!("✓ Hopfile '{}' is valid", hopfile.name);
        println!("  Tasks: {}", hopfile.tasks.len());
        println!("  Variables: {}", hopfile.variables.len());
        Ok(0)
    } else {
        println!(
            "✗ Hopfile '{}' is invalid ({} errors, {} warnings)",
            hopfile.name,
            report.errors.len(),
            report.warnings.len()
        );
        Ok(2)
    }
}

/// Write a starter hopfile into `output_dir`
pub async fn init_hopfile(output_dir: PathBuf, force: bool) -> Result<u8> {
    if !output_dir.exists() {
        tokio::fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    }

    let hopfile_path = output_dir.join(DEFAULT_HOPFILE_NAMES[0]);
    if hopfile_path.exists() && !force {
        return Err(ExecutionError::ConfigurationError(format!(
            "Hopfile already exists: {} (use --force to overwrite)",
            hopfile_path.display()
        ))
        .into());
    }

    tokio::fs::write(&hopfile_path, STARTER_HOPFILE)
        .await
        .with_context(|| format!("Failed to write {}", hopfile_path.display()))?;

    println!("Created {}", hopfile_path.display());
    Ok(0)
}

/// Exit code for an error that ended a command early
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<ExecutionError>() {
            return e.exit_code();
        }
        if cause.is::<ParserError>()
            || cause.is::<ValidationError>()
            || cause.is::<TemplateError>()
        {
            return 2;
        }
        if cause.is::<OutputError>() {
            return 1;
        }
    }
    1
}

fn resolve_hopfile_path(explicit: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    if let Some(path) = explicit.or_else(|| config.hopfile.clone()) {
        return Ok(path);
    }

    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    HopfileParser::new().discover(&cwd).ok_or_else(|| {
        ExecutionError::ConfigurationError(format!(
            "No hopfile found in {} (looked for {})",
            cwd.display(),
            DEFAULT_HOPFILE_NAMES.join(", ")
        ))
        .into()
    })
}

async fn load_hopfile(path: &Path) -> Result<Hopfile> {
    let hopfile = HopfileParser::new()
        .parse_file(path)
        .await
        .with_context(|| format!("Failed to load hopfile {}", path.display()))?;
    info!("Loaded hopfile: {}", hopfile.name);
    Ok(hopfile)
}

/// Combine hopfile target, command-line flags and the identity environment
/// variable into the run's target
fn build_target(
    hopfile: &Hopfile,
    args: &TargetArgs,
    config: &Config,
) -> Result<Option<Target>> {
    let flags = TargetConfig {
        host: args.host.clone(),
        user: args.user.clone(),
        port: args.port,
        identity: args.identity.clone(),
    };

    let mut merged = hopfile.target.clone().unwrap_or_default().merge(&flags);
    if merged.identity.is_none() {
        merged.identity = config.identity_from_env();
    }

    if let Some(ref identity) = merged.identity {
        if !identity.exists() {
            warn!("Identity file {} does not exist", identity.display());
        }
    }

    merged
        .to_target()
        .map_err(|e| ExecutionError::ConfigurationError(e.to_string()).into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

const STARTER_HOPFILE: &str = r#"name: my-project
description: Sync code and run tests on a remote host

target:
  host: example.org
  user: me

variables:
  code_dir: "~/project"

tasks:
  commit:
    description: Stage and commit local changes
    steps:
      - local: git add -p && git commit
        interactive: true

  push:
    steps:
      - local: git push

  prepare_deploy:
    description: Commit and push
    steps:
      - task: commit
      - task: push

  deploy:
    description: Pull and test on the remote host
    steps:
      - remote: git pull
        dir: "{{variables.code_dir}}"
      - remote: make test
        dir: "{{variables.code_dir}}"
        env:
          CI: "1"
        timeout: 10m
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn hopfile_with_target(yaml_target: &str) -> Hopfile {
        Hopfile::from_yaml(&format!(
            "name: t\n{}tasks:\n  a:\n    steps:\n      - local: 'true'\n",
            yaml_target
        ))
        .unwrap()
    }

    #[test]
    fn test_starter_hopfile_is_valid() {
        let hopfile = Hopfile::from_yaml(STARTER_HOPFILE).unwrap();
        let report = HopfileValidator::new().validate(&hopfile);
        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(hopfile.tasks.len(), 4);
    }

    #[test]
    fn test_flags_override_hopfile_target() {
        let hopfile = hopfile_with_target("target:\n  host: old.example.org\n  user: me\n");
        let args = TargetArgs {
            host: Some("new.example.org".to_string()),
            ..Default::default()
        };

        let target = build_target(&hopfile, &args, &Config::default())
            .unwrap()
            .unwrap();
        assert_eq!(target.to_string(), "me@new.example.org");
    }

    #[test]
    fn test_no_target_anywhere() {
        let hopfile = hopfile_with_target("");
        let target = build_target(&hopfile, &TargetArgs::default(), &Config::default()).unwrap();
        assert!(target.is_none());
    }

    #[test]
    fn test_host_without_user_is_configuration_error() {
        let hopfile = hopfile_with_target("");
        let args = TargetArgs {
            host: Some("example.org".to_string()),
            ..Default::default()
        };
        let err = build_target(&hopfile, &args, &Config::default()).unwrap_err();
        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn test_exit_code_for_wrapped_errors() {
        let err = anyhow::Error::from(ExecutionError::UnknownTask {
            task: "x".to_string(),
            referenced_by: None,
        })
        .context("while running");
        assert_eq!(exit_code_for(&err), 5);

        let err = anyhow::Error::from(ParserError::MissingField("name".to_string()));
        assert_eq!(exit_code_for(&err), 2);

        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 1);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(init_hopfile(dir.path().to_path_buf(), false).await.unwrap(), 0);

        let err = init_hopfile(dir.path().to_path_buf(), false)
            .await
            .unwrap_err();
        assert_eq!(exit_code_for(&err), 2);
        assert_eq!(init_hopfile(dir.path().to_path_buf(), true).await.unwrap(), 0);
    }
}
