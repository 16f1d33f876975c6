//! Command-line interface definitions.
//!
//! Defines the CLI structure for poolbench using `clap`: running trials,
//! listing the built-in scenarios and checking configuration files.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::infrastructure::config::logging::LogFormat;

/// Drive a database connection pool under fixed concurrency and log its statistics
#[derive(Parser, Debug)]
#[command(name = "poolbench")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Override log level (e.g. debug, info, warn or a full filter directive)
    #[arg(long, global = true, env = "POOLBENCH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Override log format [pretty, compact, json]
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config file whose `[logging]` table applies to this invocation.
    pub fn logging_config_path(&self) -> Option<&Path> {
        match &self.command {
            Commands::Run(args) => args.config.as_deref(),
            Commands::Scenarios(_) | Commands::Config(_) => None,
        }
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one or more trials
    Run(Box<RunArgs>),

    /// List built-in scenarios and configured trials
    Scenarios(ScenariosArgs),

    /// Check configuration files
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Subcommands for `poolbench config`.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration with defaults applied.
    Show(ConfigPathArg),
    /// Validate a configuration file for correctness.
    Validate(ConfigPathArg),
}

/// Shared argument struct for commands that require only a configuration path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "poolbench.toml")]
    pub config: PathBuf,
}

/// Arguments for the `scenarios` subcommand.
#[derive(Parser, Debug)]
pub struct ScenariosArgs {
    /// Also list the trials of this configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `run` subcommand.
///
/// Trials come from, in order of precedence: `--all`, `--scenario`, the
/// `[[trial]]` tables of `--config`, or the single trial described by the
/// pool and workload flags.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file (logging, backend, observer, trials).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run the named built-in scenario; repeatable.
    #[arg(short, long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Run every built-in scenario.
    #[arg(long, conflicts_with = "scenarios")]
    pub all: bool,

    // === Single trial ===
    /// Name of the single trial.
    #[arg(long, default_value = "adhoc")]
    pub name: String,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = 10)]
    pub concurrency: usize,

    /// Operations each worker issues.
    #[arg(long, default_value_t = 20)]
    pub ops: usize,

    /// Maximum open connections.
    #[arg(long, default_value_t = 10)]
    pub max_open: u32,

    /// Maximum idle connections; negative disables idle retention.
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub max_idle: i64,

    /// Maximum connection lifetime in seconds (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub max_lifetime_secs: u64,

    /// Maximum connection idle time in seconds (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub max_idle_time_secs: u64,

    /// How long an operation waits for a connection, in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub acquire_timeout_ms: u64,

    /// Statement each operation executes.
    #[arg(long, default_value = "SELECT 1")]
    pub query: String,

    /// How long each operation keeps its connection after the statement.
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,

    // === Backend and observer ===
    /// Override the database URL.
    #[arg(long, env = "POOLBENCH_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Override the backend connection limit.
    #[arg(long, env = "POOLBENCH_BACKEND_LIMIT")]
    pub backend_limit: Option<u32>,

    /// Override the observer poll interval in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_max_idle_parses() {
        let cli = Cli::try_parse_from(["poolbench", "run", "--max-idle", "-1"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_idle, -1);
        assert_eq!(args.concurrency, 10);
    }

    #[test]
    fn scenarios_repeat_and_conflict_with_all() {
        let cli = Cli::try_parse_from(["poolbench", "run", "-s", "scenario-a", "-s", "scenario-b"])
            .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.scenarios, ["scenario-a", "scenario-b"]);

        assert!(Cli::try_parse_from(["poolbench", "run", "--all", "-s", "scenario-a"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "poolbench",
            "scenarios",
            "--json",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(cli.logging_config_path().is_none());
    }
}
