//! Command line of the `unslop-host` binary.
//!
//! With no subcommand the host serves on stdin/stdout. `config` inspects or
//! edits the host configuration file in place.

use std::io::Write;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::services::config_engine::ConfigEngineTrait;
use crate::types::errors::ConfigError;

#[derive(Debug, Parser)]
#[command(name = "unslop-host", version, about = "Unslop streaming relay host")]
pub struct HostCli {
    /// Config file to use instead of `$UNSLOP_CONFIG` or the platform default
    #[arg(long = "config", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<HostSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum HostSubcommand {
    /// Serve stream ports and one-shot messages over stdin/stdout
    Serve,
    /// Inspect or change the host configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,
    /// Print the config file location
    Path,
    /// Set one value by dot path, e.g. `gemini.model gemini-2.5-flash`
    Set {
        key: String,
        /// JSON value; anything that does not parse as JSON is taken as a string
        value: String,
    },
    /// Restore and save the defaults
    Reset,
}

/// Parses a command line value: JSON when it parses, otherwise a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Runs one `config` subcommand against `engine`, printing results to `out`.
pub fn run_config_command(
    engine: &mut dyn ConfigEngineTrait,
    cmd: ConfigCommand,
    out: &mut dyn Write,
) -> Result<(), ConfigError> {
    match cmd {
        ConfigCommand::Show => {
            let config = engine.load()?;
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
            print_line(out, &json)
        }
        ConfigCommand::Path => print_line(out, engine.get_config_path()),
        ConfigCommand::Set { key, value } => {
            engine.load()?;
            engine.set_value(&key, parse_value(&value))?;
            tracing::info!(%key, path = engine.get_config_path(), "config updated");
            Ok(())
        }
        ConfigCommand::Reset => engine.reset(),
    }
}

fn print_line(out: &mut dyn Write, line: &str) -> Result<(), ConfigError> {
    writeln!(out, "{}", line).map_err(|e| ConfigError::IoError(e.to_string()))
}
