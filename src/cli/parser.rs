//! Command-line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use super::validation;

/// Distributed cron coordination for replicated application processes
#[derive(Parser, Debug)]
#[command(name = "cronmesh")]
#[command(long_about = "
cronmesh runs one replica of a distributed cron deployment. Replicas share a
database holding job configurations and a lock service, and keep their
schedules in sync through a short watch job.

EXAMPLES:
    # Start a replica with the layered configuration from ./config
    cronmesh serve

    # Start a replica with an explicit identity and admin port
    cronmesh serve --replica-id worker-1 --port 8080

    # Check configuration without starting anything
    cronmesh serve --dry-run

    # Apply, preview or roll back database migrations
    cronmesh migrate
    cronmesh migrate --dry-run
    cronmesh migrate --rollback 1
")]
#[command(version = crate::build::CLAP_LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file to load instead of the layered `config/` directory
    #[arg(short, long, value_name = "FILE", value_parser = validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Environment whose `config/{env}.toml` is layered on top of the defaults
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Log errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one replica: cron manager plus admin API (default)
    Serve {
        /// Admin API bind address
        #[arg(long, value_name = "ADDRESS", value_parser = validation::validate_host_address)]
        host: Option<String>,

        /// Admin API port
        #[arg(short, long, value_name = "PORT", value_parser = validation::validate_port)]
        port: Option<u16>,

        /// Identity of this replica in the control row
        #[arg(long, value_name = "ID", env = "CRONMESH_REPLICA_ID", value_parser = validation::validate_replica_id)]
        replica_id: Option<String>,

        /// Overrides the configured and global log level
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate the configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply or roll back the database migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Revert the last STEPS migrations
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
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

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
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
    fn test_default_behavior() {
        let cli = Cli::try_parse_from(["cronmesh"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose && !cli.quiet);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from([
            "cronmesh",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--replica-id",
            "worker-1",
            "--log-level",
            "debug",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Serve {
                host,
                port,
                replica_id,
                log_level,
                dry_run,
            }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(8080));
                assert_eq!(replica_id.as_deref(), Some("worker-1"));
                assert!(matches!(log_level, Some(LogLevel::Debug)));
                assert!(!dry_run);
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn test_migrate_flags_conflict() {
        let err = Cli::try_parse_from(["cronmesh", "migrate", "--dry-run", "--rollback", "1"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let cli = Cli::try_parse_from(["cronmesh", "migrate", "--rollback", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Migrate { dry_run: false, rollback: Some(2) })
        ));
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["cronmesh", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["cronmesh", "serve", "--port", "0"]).is_err());
    }
}
