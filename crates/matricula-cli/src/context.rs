//! Shared command context
//!
//! Loads the configuration once, opens the record store, and wires the
//! use cases every data command needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use matricula_audit::{AuditLogger, TracingNotifier};
use matricula_core::config::Config;
use matricula_core::ports::INotificationService;
use matricula_core::usecases::{
    CreateEnrollmentUseCase, EnrollmentQueryUseCase, EnrollmentStateManager, ReconcileUseCase,
};
use matricula_store::{DatabasePool, SqliteEnrollmentGateway};
use tracing::debug;

/// Configuration plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// False when no file existed and defaults are in use
    pub from_file: bool,
}

/// Loads the configuration file.
///
/// An explicit `--config` path must exist and parse. Without one, the
/// default location is tried and defaults are used if it is absent.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            Ok(LoadedConfig {
                config,
                path: path.to_path_buf(),
                from_file: true,
            })
        }
        None => {
            let path = Config::default_path();
            let from_file = path.exists();
            let config = if from_file {
                Config::load(&path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?
            } else {
                Config::default()
            };
            Ok(LoadedConfig {
                config,
                path,
                from_file,
            })
        }
    }
}

/// Open store plus the use cases built on it
pub struct AppContext {
    pub config: Config,
    pool: DatabasePool,
    gateway: Arc<SqliteEnrollmentGateway>,
    pub audit: AuditLogger,
}

impl AppContext {
    /// Validates the configuration and opens the database.
    ///
    /// `database` overrides `database.path` from the file.
    pub async fn open(loaded: &LoadedConfig, database: Option<&Path>) -> Result<Self> {
        let mut config = loaded.config.clone();
        if let Some(path) = database {
            config.database.path = path.to_path_buf();
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::bail!("Invalid configuration: {}", messages.join("; "));
        }

        debug!(path = %config.database.path.display(), "Opening database");
        let pool = DatabasePool::from_config(&config.database)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.database.path.display())
            })?;
        let gateway = Arc::new(SqliteEnrollmentGateway::new(pool.pool().clone()));

        Ok(Self {
            config,
            pool,
            gateway,
            audit: AuditLogger::new(),
        })
    }

    pub fn state_manager(&self) -> EnrollmentStateManager {
        let notifier: Arc<dyn INotificationService + Send + Sync> =
            Arc::new(TracingNotifier::from_config(&self.config.alerts));
        EnrollmentStateManager::new(
            self.gateway.clone(),
            Some(notifier),
            self.config.transitions.clone(),
        )
    }

    pub fn creator(&self) -> CreateEnrollmentUseCase {
        CreateEnrollmentUseCase::new(self.gateway.clone())
    }

    pub fn query(&self) -> EnrollmentQueryUseCase {
        EnrollmentQueryUseCase::new(self.gateway.clone())
    }

    pub fn reconciler(&self) -> ReconcileUseCase {
        ReconcileUseCase::new(self.gateway.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
