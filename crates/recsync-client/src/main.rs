//! recsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use recsync_client::cli::{Cli, Command, ConfigAction, LedgerAction};
use recsync_client::commands;
use recsync_client::config::ClientConfig;
use recsync_client::error::{ClientError, ClientResult};
use recsync_core::{TracingConfig, TracingOutputFormat, init_tracing};
use recsync_engine::ShutdownHandle;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = match cli.log_format.parse::<TracingOutputFormat>() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(format)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().map_err(ClientError::Config)?,
    };

    match cli.command {
        Command::Sync(ref args) => {
            let shutdown = ShutdownHandle::new();
            shutdown.listen_for_signals();
            commands::sync::sync(&config, args, shutdown).await
        }
        Command::Users { json } => commands::users::users(&config, json).await,
        Command::Ledger { ref action } => match action {
            LedgerAction::Path => commands::ledger::path(&config),
            LedgerAction::List => commands::ledger::list(&config),
            LedgerAction::Contains { id } => commands::ledger::contains(&config, id),
        },
        Command::Config { ref action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config),
        },
    }
}
