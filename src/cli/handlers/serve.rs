//! Serve command handler

use crate::config::settings::Settings;
use crate::cron::interval_to_cron;
use crate::error::AppResult;
use crate::server::Server;

pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Runs the replica until shutdown, or only reports the resolved setup
    /// when `dry_run` is set.
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        self.config.validate()?;

        if dry_run {
            for line in self.summary() {
                println!("✓ {}", line);
            }
            println!("Dry run completed successfully - configuration is ready for deployment");
            return Ok(());
        }

        Server::new(self.config.clone()).run().await
    }

    fn summary(&self) -> Vec<String> {
        let cron = &self.config.cron;
        let lock_service = if self.config.redis.is_configured() {
            format!("redis ({})", self.config.redis.url)
        } else {
            "in-process (single replica only)".to_string()
        };

        vec![
            "Configuration is valid".to_string(),
            format!("Admin API would bind to: {}", self.config.server.address()),
            format!("Replica id: {}", cron.resolved_replica_id()),
            format!(
                "Cron manager: {}",
                if cron.enabled { "enabled" } else { "disabled" }
            ),
            format!("Store backend: {}", cron.backend.as_str()),
            format!("Lock service: {}", lock_service),
            format!(
                "Watch job: every {} ({})",
                cron.watch_time,
                interval_to_cron(&cron.watch_time)
            ),
            format!(
                "Query encryption: {}",
                if cron.query_secret.is_some() { "configured" } else { "not configured" }
            ),
        ]
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::StoreBackend;

    fn memory_config() -> Settings {
        let mut config = Settings::default();
        config.cron.backend = StoreBackend::Memory;
        config.cron.replica_id = Some("worker-1".to_string());
        config.redis.url = String::new();
        config
    }

    #[test]
    fn test_serve_handler_keeps_config() {
        let handler = ServeCommandHandler::new(memory_config());
        assert_eq!(handler.config(), &memory_config());
    }

    #[test]
    fn test_summary_reports_resolved_setup() {
        let handler = ServeCommandHandler::new(memory_config());
        let summary = handler.summary();

        assert!(summary.contains(&"Replica id: worker-1".to_string()));
        assert!(summary.contains(&"Store backend: memory".to_string()));
        assert!(summary.iter().any(|l| l.starts_with("Lock service: in-process")));
        assert!(summary.contains(&"Watch job: every 5s (*/5 * * * * *)".to_string()));
    }

    #[tokio::test]
    async fn test_dry_run_succeeds() {
        let handler = ServeCommandHandler::new(memory_config());
        assert!(handler.execute(true).await.is_ok());
    }

    #[tokio::test]
    async fn test_dry_run_rejects_invalid_config() {
        let mut config = memory_config();
        config.server.port = 0;

        let handler = ServeCommandHandler::new(config);
        assert!(handler.execute(true).await.is_err());
    }
}
