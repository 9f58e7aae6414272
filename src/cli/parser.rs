//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::build;

/// Ticket tracker operator driven from chat
#[derive(Parser, Debug)]
#[command(name = "tracker-operator")]
#[command(about = "Runs tracker lifecycle jobs and reports, driven from chat")]
#[command(long_about = "
tracker-operator keeps a Bugzilla product tidy: it marks idle bugs stale,
closes bugs that stayed stale, and posts scheduled reports to chat channels.
Jobs can be triggered, dry-run in debug mode or run as reports from chat.

EXAMPLES:
    # Start the operator with the layered configuration in ./config
    tracker-operator serve

    # Listen for commands on another port
    tracker-operator serve --host 0.0.0.0 --port 8080

    # Use a single configuration file
    tracker-operator --config /etc/tracker-operator/operator.toml serve

    # Check configuration and schedules without starting anything
    tracker-operator serve --dry-run

    # List the jobs the configuration defines
    tracker-operator jobs
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute, `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered files in the
    /// configuration directory. Environment variables still apply.
    ///
    /// Example: --config /etc/tracker-operator/operator.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` is layered over the defaults.
    ///
    /// Available values: development (dev), staging (stage), production (prod), test
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the operator (default)
    ///
    /// Binds the command listener, starts one loop per enabled job and runs
    /// until Ctrl+C or SIGTERM.
    ///
    /// Examples:
    ///   tracker-operator serve                 # Start with defaults
    ///   tracker-operator serve --port 8080     # Listen on port 8080
    ///   tracker-operator serve --dry-run       # Validate config without starting
    Serve {
        /// Host address of the command listener
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port of the command listener
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override
        ///
        /// Overrides both the configuration file and --verbose/--quiet.
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and schedules, then exit
        ///
        /// Builds the job registry without contacting the tracker or the chat
        /// platform. Returns exit code 0 if valid, non-zero if invalid.
        #[arg(long)]
        dry_run: bool,
    },
    /// List controllers, reports and scheduled jobs
    Jobs,
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// The subcommand to run, `serve` without overrides when none was given.
    pub fn subcommand(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve {
            host: None,
            port: None,
            log_level: None,
            dry_run: false,
        })
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
        .to_string()
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["tracker-operator", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["tracker-operator", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::try_parse_from(["tracker-operator"]).unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(cli.subcommand(), Commands::Serve { dry_run: false, .. }));
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from([
            "tracker-operator",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(
            cli.subcommand(),
            Commands::Serve {
                host: Some("127.0.0.1".to_string()),
                port: Some(8080),
                log_level: Some(LogLevel::Debug),
                dry_run: false,
            }
        );
    }

    #[test]
    fn test_jobs_command() {
        let cli = Cli::try_parse_from(["tracker-operator", "--env", "prod", "jobs"]).unwrap();
        assert_eq!(cli.subcommand(), Commands::Jobs);
        assert_eq!(cli.env, Some(Environment::Production));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Cli::try_parse_from(["tracker-operator", "serve", "--port", "0"]).is_err());
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["tracker-operator", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
