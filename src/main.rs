use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use kastql::GatewayConfig;
use kastql::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let config = GatewayConfig::load(args.config.as_deref());
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.as_str())
        .unwrap_or("info");
    cli::init_logging(args.verbose, args.quiet, log_level);

    let result = match config {
        Ok(config) => cli::run(args.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
