// ABOUTME: Main application orchestration for the taskhop CLI
// ABOUTME: Initializes logging and dispatches parsed arguments to the command implementations

use anyhow::Result;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::commands::{self, RunOptions};
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration. Logs go to stderr so that
    /// stdout carries only step output and results.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(!no_color)
            .with_target(false);

        match self.config.logging.format.as_str() {
            "compact" => builder.compact().try_init(),
            _ => builder.try_init(),
        }
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the command named by `args`, returning the process exit code
    pub async fn run(&self, args: Args) -> Result<u8> {
        self.init_logging(args.verbose, args.no_color)?;

        debug!("Starting taskhop v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                task,
                hopfile,
                target,
                vars,
                dry_run,
                format,
                output,
            } => {
                let options = RunOptions {
                    task,
                    hopfile,
                    target,
                    vars,
                    dry_run,
                    format,
                    output,
                };
                commands::run_task(options, &self.config).await
            }

            Commands::List { hopfile } => commands::list_tasks(hopfile, &self.config).await,

            Commands::Validate {
                hopfile,
                strict,
                with_target,
            } => commands::validate_hopfile(hopfile, strict, with_target, &self.config).await,

            Commands::Init { output_dir, force } => commands::init_hopfile(output_dir, force).await,
        }
    }

    /// Parse the command line and load the configuration it points at
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}
