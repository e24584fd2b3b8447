// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the taskhop CLI structure and its run, list, validate and init subcommands

use clap::{Args as ClapArgs, Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "taskhop")]
#[command(about = "Run named tasks of local and remote shell steps against a remote host")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

/// Target settings given on the command line; each one overrides the hopfile
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TargetArgs {
    #[arg(long, help = "Remote host to run remote steps on")]
    pub host: Option<String>,

    #[arg(long, help = "User to log in as")]
    pub user: Option<String>,

    #[arg(long, help = "SSH port")]
    pub port: Option<u16>,

    #[arg(long, help = "SSH identity file")]
    pub identity: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task from the hopfile
    Run {
        #[arg(help = "Name of the task to run")]
        task: String,

        #[arg(short = 'f', long, help = "Path to the hopfile")]
        hopfile: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,

        #[arg(
            short = 'V',
            long = "var",
            help = "Override template variables (key=value)"
        )]
        vars: Vec<String>,

        #[arg(long, help = "Print the resolved steps without running them")]
        dry_run: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Result format")]
        format: OutputFormat,

        #[arg(short, long, help = "Write the result to a file instead of stdout")]
        output: Option<PathBuf>,
    },

    /// List the tasks defined in the hopfile
    List {
        #[arg(short = 'f', long, help = "Path to the hopfile")]
        hopfile: Option<PathBuf>,
    },

    /// Validate a hopfile without running anything
    Validate {
        #[arg(short = 'f', long, help = "Path to the hopfile")]
        hopfile: Option<PathBuf>,

        #[arg(long, help = "Treat warnings as errors")]
        strict: bool,

        #[arg(long, help = "Assume a target will be given with --host/--user")]
        with_target: bool,
    },

    /// Write a starter hopfile
    Init {
        #[arg(short, long, help = "Output directory", default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, help = "Overwrite an existing hopfile")]
        force: bool,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<IndexMap<String, String>> {
        let mut variables = IndexMap::new();

        for var in vars {
            match var.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    variables.insert(key.trim().to_string(), value.to_string());
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid variable format '{}'. Expected 'key=value'",
                        var
                    ));
                }
            }
        }

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let vars = vec![
            "code_dir=~/6.824".to_string(),
            "lab=paxos".to_string(),
            "flags=-run=TestBasic".to_string(),
        ];

        let parsed = Args::parse_variables(&vars).unwrap();

        assert_eq!(parsed.get("code_dir").map(String::as_str), Some("~/6.824"));
        assert_eq!(parsed.get("lab").map(String::as_str), Some("paxos"));
        assert_eq!(parsed.get("flags").map(String::as_str), Some("-run=TestBasic"));
    }

    #[test]
    fn test_parse_variables_invalid() {
        assert!(Args::parse_variables(&["invalid_format".to_string()]).is_err());
        assert!(Args::parse_variables(&["=value".to_string()]).is_err());
    }

    #[test]
    fn test_run_command_parsing() {
        let args = Args::try_parse_from([
            "taskhop",
            "run",
            "deploy",
            "--host",
            "athena.dialup.mit.edu",
            "--user",
            "student",
            "-V",
            "lab=paxos",
            "--format",
            "json",
        ])
        .unwrap();

        match args.command {
            Commands::Run {
                task,
                target,
                vars,
                format,
                dry_run,
                ..
            } => {
                assert_eq!(task, "deploy");
                assert_eq!(target.host.as_deref(), Some("athena.dialup.mit.edu"));
                assert_eq!(target.user.as_deref(), Some("student"));
                assert_eq!(vars, vec!["lab=paxos"]);
                assert_eq!(format, OutputFormat::Json);
                assert!(!dry_run);
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::try_parse_from(["taskhop", "list", "--verbose", "--no-color"]).unwrap();
        assert!(args.verbose);
        assert!(args.no_color);
        assert!(matches!(args.command, Commands::List { hopfile: None }));
    }
}
