//! Replica lifecycle: wires the store, lock service and cron manager, serves
//! the admin API and tears everything down on shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use crate::api::routes::create_router;
use crate::cli::handlers::run_pending_migrations;
use crate::config::settings::{Settings, StoreBackend};
use crate::cron::{CronManager, CronManagerOptions, MethodRegistry};
use crate::db::establish_async_connection_pool;
use crate::error::{AppError, AppResult};
use crate::lock::{LockService, MemoryLockService, RedisLockService};
use crate::repositories::{DatabaseOps, MemoryOperations, PostgresOperations};
use crate::state::AppState;

pub struct Server {
    settings: Settings,
    methods: MethodRegistry,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            methods: MethodRegistry::new(),
        }
    }

    /// Callbacks for method-type jobs on this replica.
    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.methods = methods;
        self
    }

    /// Runs until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    /// - The store or lock service cannot be reached
    /// - The cron manager fails to join the deployment
    /// - The admin address cannot be bound
    pub async fn run(self) -> AppResult<()> {
        self.log_configuration();

        let store = self.build_store().await?;
        let locks = self.build_lock_service().await?;

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            AppError::Internal {
                source: anyhow::anyhow!("Failed to bind to {}: {}", address, e),
            }
        })?;
        tracing::info!(address = %address, "Admin API listening");

        let options = CronManagerOptions::from(&self.settings.cron);
        let manager = CronManager::new(options, store, locks, self.methods).await?;
        manager.start().await?;

        let router = create_router(AppState::new(manager.clone()));

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        // Timers and locks are released even when the listener failed.
        manager.shutdown().await?;
        served.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn log_configuration(&self) {
        let settings = &self.settings;
        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            "Application starting"
        );
        tracing::info!(
            host = %settings.server.host,
            port = %settings.server.port,
            "Server configuration loaded"
        );
        tracing::info!(
            enabled = settings.cron.enabled,
            replica_id = ?settings.cron.replica_id,
            watch_time = %settings.cron.watch_time,
            backend = settings.cron.backend.as_str(),
            query_secret_configured = settings.cron.query_secret.is_some(),
            release_locks_on_shutdown = settings.cron.release_locks_on_shutdown,
            "Cron configuration loaded"
        );
    }

    async fn build_store(&self) -> AppResult<Arc<dyn DatabaseOps>> {
        match self.settings.cron.backend {
            StoreBackend::Postgres => {
                let database = &self.settings.database;
                if database.auto_migrate {
                    let applied = run_pending_migrations(&database.url).await?;
                    tracing::info!(count = applied.len(), "Applied pending migrations");
                }

                let pool = establish_async_connection_pool(database).await?;
                tracing::info!(
                    max_connections = database.max_connections,
                    "Database connection pool initialized"
                );
                Ok(Arc::new(PostgresOperations::new(pool)))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; job configurations are lost on restart");
                Ok(Arc::new(MemoryOperations::new()))
            }
        }
    }

    async fn build_lock_service(&self) -> AppResult<Arc<dyn LockService>> {
        let redis = &self.settings.redis;
        if !redis.is_configured() {
            tracing::warn!("No redis.url configured; locks only coordinate jobs inside this process");
            return Ok(Arc::new(MemoryLockService::new()));
        }

        let service = RedisLockService::new(redis).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to the lock service");
            AppError::ServiceUnavailable {
                message: e.to_string(),
            }
        })?;
        tracing::info!(pool_size = redis.pool_size, "Redis lock service initialized");
        Ok(Arc::new(service))
    }
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
