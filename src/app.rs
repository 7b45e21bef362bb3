//! App core for Unslop.
//!
//! Composition root shared by the relay, the one-shot handler and the host:
//! storage, host configuration and the pooled HTTP client used by providers.

use std::sync::Arc;

use crate::database::Database;
use crate::providers::{build_http_client, resolve_provider, ProviderClient};
use crate::services::storage::{Storage, StorageTrait};
use crate::types::config::HostConfig;
use crate::types::errors::{HostError, StorageError};
use crate::types::settings::ProviderKind;

/// Storage handle shared across port tasks.
pub type SharedStorage = Arc<dyn StorageTrait + Send + Sync>;

/// Central application struct holding storage, config and the HTTP client.
pub struct App {
    pub storage: SharedStorage,
    pub config: HostConfig,
    http: reqwest::Client,
}

impl App {
    /// Creates an App over an opened database.
    pub fn new(config: HostConfig, db: Arc<Database>) -> Result<Self, HostError> {
        Self::with_storage(config, Arc::new(Storage::new(db)))
    }

    /// Creates an App over any storage implementation.
    pub fn with_storage(config: HostConfig, storage: SharedStorage) -> Result<Self, HostError> {
        let http = build_http_client()?;
        Ok(Self {
            storage,
            config,
            http,
        })
    }

    /// App backed by a fresh in-memory database.
    pub fn in_memory(config: HostConfig) -> Result<Self, HostError> {
        let db = Database::open_in_memory()
            .map_err(|e| HostError::Startup(format!("in-memory database: {}", e)))?;
        Self::new(config, Arc::new(db))
    }

    /// Runs `f` against storage on the blocking pool.
    ///
    /// A panic inside `f` resumes on the awaiting task.
    pub async fn storage_call<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StorageTrait) -> Result<T, StorageError> + Send + 'static,
    {
        let storage = self.storage.clone();
        match tokio::task::spawn_blocking(move || f(storage.as_ref())).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(StorageError::DatabaseError(e.to_string())),
        }
    }

    /// Provider client for `kind`, sharing this app's connection pool.
    pub fn provider(&self, kind: ProviderKind) -> Box<dyn ProviderClient> {
        resolve_provider(kind, &self.config, self.http.clone())
    }
}
