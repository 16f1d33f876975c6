//! Global flag handling and subcommand dispatch.

use super::command::{Cli, Commands, ConfigCommand};
use super::{config, output, run, scenarios};

use crate::error::Result;
use crate::infrastructure::config::logging::LoggingConfig;
use crate::infrastructure::config::settings::HarnessConfig;

/// Apply the global output flags.
pub fn configure_output(cli: &Cli) {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet));
}

/// Configuration file for this invocation, or defaults when none applies.
pub fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    match cli.logging_config_path() {
        Some(path) => HarnessConfig::load(path),
        None => Ok(HarnessConfig::default()),
    }
}

/// Logging settings with the global flags applied.
pub fn logging_config(cli: &Cli, config: &HarnessConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging
}

/// Run the selected subcommand.
pub async fn execute(cli: Cli, config: HarnessConfig) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run::execute(&args, config).await,
        Commands::Scenarios(args) => scenarios::execute(args.config.as_deref()),
        Commands::Config(ConfigCommand::Show(arg)) => config::execute_show(&arg.config),
        Commands::Config(ConfigCommand::Validate(arg)) => config::execute_validate(&arg.config),
    }
}
