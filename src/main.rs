//! `tezos-ops` entry point.
//!
//! Exit status is 0 on success and one code per failure class otherwise,
//! so scripts can tell a rejected operation from one with an unknown
//! outcome.

use std::process::ExitCode;

use clap::Parser;
use tracing::Instrument;

use tezos_ops::cli::Cli;
use tezos_ops::config::{load_config_or_default, ProcessEnv};
use tezos_ops::error::ErrorKind;
use tezos_ops::observability::{logging, tracing::run_span};

#[tokio::main]
async fn main() -> ExitCode {
    ProcessEnv::load_dotenv();
    let cli = Cli::parse();

    let config = match load_config_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tezos-ops: {e}");
            return ExitCode::from(ErrorKind::Configuration.exit_code());
        }
    };
    logging::init(&config.observability);

    let action = cli.command.name();
    let result = cli
        .command
        .run(&ProcessEnv, &config)
        .instrument(run_span(action))
        .await;

    match result {
        Ok(report) => {
            report.log();
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(action, error = %error.to_json(), "Action failed");
            ExitCode::from(error.exit_code())
        }
    }
}
