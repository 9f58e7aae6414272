//! CLI module for tracker-operator
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing with clap
//! - Configuration loading with command-line overrides
//! - Command execution and validation
//! - Command handlers for the serve and jobs operations

pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, LogLevel};

use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, settings::Settings};

/// Load configuration and apply command-line overrides
///
/// Precedence, lowest first: configuration files, `OPERATOR_*` environment
/// variables, global flags (`--verbose`/`--quiet`), subcommand arguments.
/// The merged settings are validated once at the end.
///
/// # Errors
/// Returns an error if loading, merging or validation fails
pub fn load_and_merge_config(cli: &Cli) -> Result<Settings, ConfigError> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::from_file(path),
        None => ConfigLoader::new()?,
    };
    let loader = match cli.env {
        Some(env) => loader.with_environment(env.into()),
        None => loader,
    };

    let mut settings = loader.load_unvalidated()?;
    apply_overrides(&mut settings, cli);
    settings.validate()?;
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if cli.verbose {
        settings.logger.level = "debug".to_string();
    } else if cli.quiet {
        settings.logger.level = "error".to_string();
    }

    if let Commands::Serve {
        host,
        port,
        log_level,
        ..
    } = cli.subcommand()
    {
        if let Some(host) = host {
            settings.server.host = host;
        }
        if let Some(port) = port {
            settings.server.port = port;
        }
        // subcommand level beats the global flags
        if let Some(level) = log_level {
            settings.logger.level = level.into();
        }
    }
}
