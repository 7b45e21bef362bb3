//! Unslop host: stream ports and one-shot messages over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON); see `unslop::host`.
//! `unslop-host config …` edits the configuration instead of serving.
//! Diagnostics go to stderr so stdout carries protocol frames only.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;

use unslop::app::App;
use unslop::cli::{run_config_command, HostCli, HostSubcommand};
use unslop::database::Database;
use unslop::host::Host;
use unslop::logging;
use unslop::services::config_engine::{ConfigEngine, ConfigEngineTrait};
use unslop::types::errors::HostError;

async fn start(mut engine: ConfigEngine) -> Result<(), HostError> {
    let config = match engine.load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("unslop-host: {}, using defaults", e);
            engine.get_config().clone()
        }
    };
    logging::init(&config.log_filter);

    let db_path = engine.database_path();
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    tracing::info!(path = %db_path.display(), config = engine.get_config_path(), "opening database");
    let db = Database::open(&db_path)
        .map_err(|e| HostError::Startup(format!("database {}: {}", db_path.display(), e)))?;

    let app = Arc::new(App::new(config, Arc::new(db))?);
    Host::new(app)
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = HostCli::parse();
    let mut engine = ConfigEngine::new(cli.config);

    if let Some(HostSubcommand::Config(cmd)) = cli.cmd {
        logging::init("warn");
        return match run_config_command(&mut engine, cmd, &mut std::io::stdout()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("unslop-host: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match start(engine).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "host stopped");
            eprintln!("unslop-host: {}", e);
            ExitCode::FAILURE
        }
    }
}
