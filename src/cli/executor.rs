//! Dispatches a parsed command to its handler.

use super::handlers::{MigrateCommandHandler, ServeCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::AppResult;

/// Runs the command in `cli` with merged `settings`. No subcommand means `serve`.
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Migrate { dry_run, rollback }) => {
            if let Some(steps) = rollback
                && *steps > 50
            {
                tracing::warn!(steps, "Rolling back a large number of migrations");
            }
            MigrateCommandHandler::new(settings)
                .execute(*dry_run, *rollback)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::StoreBackend;
    use crate::error::AppError;
    use clap::Parser;

    #[tokio::test]
    async fn test_execute_serve_dry_run() {
        let mut config = Settings::default();
        config.cron.backend = StoreBackend::Memory;
        let cli = Cli::try_parse_from(["cronmesh", "serve", "--dry-run"]).unwrap();

        assert!(execute_command(&cli, config).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_migrate_validates_database() {
        let cli = Cli::try_parse_from(["cronmesh", "migrate", "--dry-run"]).unwrap();

        let result = execute_command(&cli, Settings::default()).await;
        assert!(matches!(result, Err(AppError::Configuration { ref key, .. }) if key == "database.url"));
    }
}
