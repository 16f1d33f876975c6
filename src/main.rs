use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use poolbench::adapter::inbound::cli::{command::Cli, dispatch, output};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    dispatch::configure_output(&cli);

    let config = match dispatch::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("Failed to load config: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let (subscriber, _log_guard) = match dispatch::logging_config(&cli, &config).build() {
        Ok(built) => built,
        Err(e) => {
            output::error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    if tracing::dispatcher::set_global_default(subscriber).is_err() {
        output::error("A global tracing subscriber is already installed");
        return ExitCode::FAILURE;
    }
    info!(version = env!("CARGO_PKG_VERSION"), "poolbench starting");

    match dispatch::execute(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "poolbench failed");
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
