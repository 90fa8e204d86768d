//! Migrate command handler

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::MigrationHarness;

use crate::config::settings::Settings;
use crate::db::MIGRATIONS;
use crate::error::{AppError, AppResult};

/// Runs `f` on a fresh blocking connection to `database_url`.
async fn with_blocking_connection<T, F>(database_url: &str, operation: &'static str, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
{
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&database_url).map_err(|e| AppError::Database {
            operation: format!("establish connection to {}", operation),
            source: anyhow::anyhow!("Connection error: {}", e),
        })?;
        f(&mut conn)
    })
    .await
    .map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })?
}

fn migration_error(operation: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Database {
        operation: operation.to_string(),
        source: anyhow::anyhow!("Migration error: {}", e),
    }
}

/// Applies every pending migration and returns the applied versions.
pub async fn run_pending_migrations(database_url: &str) -> AppResult<Vec<String>> {
    with_blocking_connection(database_url, "run migrations", |conn| {
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| migration_error("run pending migrations", e))?;
        Ok(applied.iter().map(|m| m.to_string()).collect())
    })
    .await
}

pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Shows, applies or reverts migrations against `database.url`.
    ///
    /// # Errors
    /// - The database section is invalid
    /// - The database is unreachable or a migration fails
    /// - `rollback` exceeds the number of applied migrations
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        if let Some(0) = rollback {
            return Err(AppError::Validation {
                field: "rollback_steps".to_string(),
                reason: "Number of rollback steps must be greater than 0".to_string(),
            });
        }

        self.config.database.validate()?;

        match (dry_run, rollback) {
            (true, _) => self.show_pending_migrations().await,
            (false, Some(steps)) => self.rollback_migrations(steps).await,
            (false, None) => self.run_migrations().await,
        }
    }

    async fn show_pending_migrations(&self) -> AppResult<()> {
        println!("Checking for pending migrations...");

        let pending: Vec<String> =
            with_blocking_connection(&self.config.database.url, "check migrations", |conn| {
                let pending = conn
                    .pending_migrations(MIGRATIONS)
                    .map_err(|e| migration_error("check pending migrations", e))?;
                Ok(pending.iter().map(|m| m.name().to_string()).collect())
            })
            .await?;

        if pending.is_empty() {
            println!("✓ No pending migrations found - database is up to date");
        } else {
            println!("Found {} pending migration(s):", pending.len());
            for name in &pending {
                println!("  - {}", name);
            }
            println!("\nRun without --dry-run to apply these migrations");
        }
        Ok(())
    }

    async fn run_migrations(&self) -> AppResult<()> {
        println!("Running database migrations...");

        let applied = run_pending_migrations(&self.config.database.url).await?;
        if applied.is_empty() {
            println!("✓ No migrations to apply - database is already up to date");
        } else {
            println!("✓ Applied {} migration(s):", applied.len());
            for migration in &applied {
                println!("  - {}", migration);
            }
        }
        Ok(())
    }

    async fn rollback_migrations(&self, steps: u32) -> AppResult<()> {
        println!("Rolling back {} migration(s)...", steps);

        let reverted: Vec<String> =
            with_blocking_connection(&self.config.database.url, "roll back migrations", move |conn| {
                let applied = conn
                    .applied_migrations()
                    .map_err(|e| migration_error("get applied migrations", e))?;

                if applied.len() < steps as usize {
                    return Err(AppError::Validation {
                        field: "rollback_steps".to_string(),
                        reason: format!(
                            "Cannot rollback {} migrations - only {} applied migrations available",
                            steps,
                            applied.len()
                        ),
                    });
                }

                (0..steps)
                    .map(|_| {
                        conn.revert_last_migration(MIGRATIONS)
                            .map(|version| version.to_string())
                            .map_err(|e| migration_error("revert migration", e))
                    })
                    .collect()
            })
            .await?;

        for version in &reverted {
            println!("  - reverted {}", version);
        }
        println!("✓ Rolled back {} migration(s)", reverted.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_url(url: &str) -> Settings {
        let mut config = Settings::default();
        config.database.url = url.to_string();
        config
    }

    #[tokio::test]
    async fn test_zero_rollback_steps_is_rejected() {
        let handler = MigrateCommandHandler::new(config_with_url("postgres://localhost/cron"));

        match handler.execute(false, Some(0)).await {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("greater than 0"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_database_url_fails_before_connecting() {
        let handler = MigrateCommandHandler::new(config_with_url(""));

        let result = handler.execute(true, None).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
