pub mod backend;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod snapshot;

use std::sync::Arc;

use tracing::info;

use flagdeck_core::config::StorageBackend;
use flagdeck_core::{AuditLog, AuditRecorder, Config};

pub use backend::{DataSourceStore, ExperimentFilter, ExperimentStore, MetricStore};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use snapshot::Snapshot;

/// Config-driven set of entity stores plus the audit sink that lives
/// alongside them.
#[derive(Clone)]
pub struct StorageEngine {
    pub experiments: Arc<dyn ExperimentStore>,
    pub datasources: Arc<dyn DataSourceStore>,
    pub metrics: Arc<dyn MetricStore>,
    pub audit: Arc<dyn AuditRecorder>,
    pub backend: StorageBackend,
}

impl StorageEngine {
    /// Build the engine selected by `STORAGE_BACKEND`. The memory backend
    /// keeps its audit log in process; postgres writes it to `audit_events`.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        match config.storage.backend {
            StorageBackend::Memory => {
                let path = config.storage.snapshot_path();
                if let Some(p) = &path {
                    info!("Memory storage with snapshot at {}", p.display());
                } else {
                    info!("Memory storage without persistence");
                }
                let store = Arc::new(MemoryStore::open(path)?);
                let audit = AuditLog::with_max_entries(config.audit.max_entries_per_entity);
                Ok(Self::memory(store, Arc::new(audit)))
            }
            StorageBackend::Postgres => {
                let store = Arc::new(PgStore::connect(&config.postgres).await?);
                Ok(Self {
                    experiments: store.clone(),
                    datasources: store.clone(),
                    metrics: store.clone(),
                    audit: store,
                    backend: StorageBackend::Postgres,
                })
            }
        }
    }

    pub fn memory(store: Arc<MemoryStore>, audit: Arc<dyn AuditRecorder>) -> Self {
        Self {
            experiments: store.clone(),
            datasources: store.clone(),
            metrics: store,
            audit,
            backend: StorageBackend::Memory,
        }
    }

    /// Insert every entity in `snapshot`, skipping ones whose id already
    /// exists. Returns how many were inserted.
    pub async fn seed(&self, snapshot: Snapshot) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for ds in snapshot.datasources {
            inserted += skip_conflict(self.datasources.insert_datasource(ds).await)?;
        }
        for exp in snapshot.experiments {
            inserted += skip_conflict(self.experiments.insert_experiment(exp).await)?;
        }
        for metric in snapshot.metrics {
            inserted += skip_conflict(self.metrics.insert_metric(metric).await)?;
        }
        info!("Seeded {} entities", inserted);
        Ok(inserted)
    }
}

fn skip_conflict(res: Result<(), StorageError>) -> Result<usize, StorageError> {
    match res {
        Ok(()) => Ok(1),
        Err(StorageError::Conflict { field, value }) => {
            tracing::warn!("Seed skipped existing {} {}", field, value);
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_is_idempotent() {
        let engine = StorageEngine::memory(Arc::new(MemoryStore::new()), Arc::new(AuditLog::new()));
        let snapshot: Snapshot = serde_json::from_value(serde_json::json!({
            "datasources": [{"id": "ds_1", "organization": "org_1"}],
            "metrics": [{
                "id": "met_1", "organization": "org_1", "name": "Orders",
                "datasource": "ds_1", "type": "count",
                "dateCreated": "2026-01-05T10:00:00Z", "dateUpdated": "2026-01-05T10:00:00Z"
            }]
        }))
        .unwrap();

        assert_eq!(engine.seed(snapshot.clone()).await.unwrap(), 2);
        assert_eq!(engine.seed(snapshot).await.unwrap(), 0);
        assert!(engine.datasources.get_datasource("org_1", "ds_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn memory_backend_from_config() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::for_profile("test");
        config.storage.backend = StorageBackend::Memory;
        config.storage.data_dir = tmp.path().to_path_buf();
        let engine = StorageEngine::from_config(&config).await.unwrap();
        assert_eq!(engine.backend, StorageBackend::Memory);
    }
}
