//! In-process backend: `IndexMap` tables behind a tokio `RwLock`, optionally
//! persisted to a JSON snapshot after every mutation.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use flagdeck_core::{DataSource, Experiment, ExperimentChanges, Metric, MetricFilter, RequestContext};

use crate::backend::{DataSourceStore, ExperimentFilter, ExperimentStore, MetricStore};
use crate::error::StorageError;
use crate::snapshot::Snapshot;

#[derive(Default)]
struct Tables {
    experiments: IndexMap<String, Experiment>,
    datasources: IndexMap<String, DataSource>,
    metrics: IndexMap<String, Metric>,
}

impl Tables {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            experiments: snapshot.experiments.into_iter().map(|e| (e.id.clone(), e)).collect(),
            datasources: snapshot.datasources.into_iter().map(|d| (d.id.clone(), d)).collect(),
            metrics: snapshot.metrics.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            experiments: self.experiments.values().cloned().collect(),
            datasources: self.datasources.values().cloned().collect(),
            metrics: self.metrics.values().cloned().collect(),
        }
    }

    fn tracking_key_taken(&self, organization: &str, tracking_key: &str, except_id: &str) -> bool {
        self.experiments
            .values()
            .any(|e| e.organization == organization && e.tracking_key == tracking_key && e.id != except_id)
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Purely in-process store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Load the snapshot at `path` (if any) and keep it current on writes.
    pub fn open(path: Option<PathBuf>) -> Result<Self, StorageError> {
        let tables = match &path {
            Some(p) => Tables::from_snapshot(Snapshot::load(p)?),
            None => Tables::default(),
        };
        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: path,
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.tables.read().await.to_snapshot()
    }

    fn persist(&self, tables: &Tables) -> Result<(), StorageError> {
        if let Some(path) = &self.snapshot_path {
            tables.to_snapshot().save(path)?;
            debug!("Snapshot written to {}", path.display());
        }
        Ok(())
    }

    /// Persist a mutation already applied to `tables`, undoing it with
    /// `rollback` if the snapshot cannot be written.
    fn commit<F>(&self, tables: &mut Tables, rollback: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Tables),
    {
        if let Err(e) = self.persist(tables) {
            rollback(tables);
            warn!("Snapshot write failed, change rolled back: {}", e);
            return Err(e);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_creation<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (chrono::DateTime<Utc>, String),
{
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl ExperimentStore for MemoryStore {
    async fn get_experiment(&self, organization: &str, id: &str) -> Result<Option<Experiment>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .experiments
            .get(id)
            .filter(|e| e.organization == organization)
            .cloned())
    }

    async fn get_experiment_by_tracking_key(
        &self,
        organization: &str,
        tracking_key: &str,
    ) -> Result<Option<Experiment>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .experiments
            .values()
            .find(|e| e.organization == organization && e.tracking_key == tracking_key)
            .cloned())
    }

    async fn list_experiments(
        &self,
        organization: &str,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StorageError> {
        let tables = self.tables.read().await;
        let items = tables
            .experiments
            .values()
            .filter(|e| e.organization == organization && filter.matches(e))
            .cloned()
            .collect();
        Ok(sorted_by_creation(items, |e: &Experiment| (e.date_created, e.id.clone())))
    }

    async fn insert_experiment(&self, experiment: Experiment) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.experiments.contains_key(&experiment.id) {
            return Err(StorageError::Conflict {
                field: "id",
                value: experiment.id,
            });
        }
        if tables.tracking_key_taken(&experiment.organization, &experiment.tracking_key, &experiment.id) {
            return Err(StorageError::Conflict {
                field: "tracking_key",
                value: experiment.tracking_key,
            });
        }
        let id = experiment.id.clone();
        tables.experiments.insert(id.clone(), experiment);
        self.commit(&mut tables, |t| {
            t.experiments.shift_remove(&id);
        })
    }

    async fn update_experiment(
        &self,
        ctx: &RequestContext,
        experiment: &Experiment,
        changes: &ExperimentChanges,
    ) -> Result<Option<Experiment>, StorageError> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables
            .experiments
            .get(&experiment.id)
            .filter(|e| e.organization == experiment.organization)
        else {
            return Ok(None);
        };

        let updated = changes.apply(current, Utc::now());
        if updated.tracking_key != current.tracking_key
            && tables.tracking_key_taken(&updated.organization, &updated.tracking_key, &updated.id)
        {
            return Err(StorageError::Conflict {
                field: "tracking_key",
                value: updated.tracking_key,
            });
        }

        let previous = current.clone();
        tables.experiments.insert(updated.id.clone(), updated.clone());
        self.commit(&mut tables, |t| {
            t.experiments.insert(previous.id.clone(), previous);
        })?;
        debug!(experiment = %updated.id, user = %ctx.user_id(), "Experiment updated");
        Ok(Some(updated))
    }
}

#[async_trait]
impl DataSourceStore for MemoryStore {
    async fn get_datasource(&self, organization: &str, id: &str) -> Result<Option<DataSource>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .datasources
            .get(id)
            .filter(|d| d.organization == organization)
            .cloned())
    }

    async fn insert_datasource(&self, datasource: DataSource) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.datasources.contains_key(&datasource.id) {
            return Err(StorageError::Conflict {
                field: "id",
                value: datasource.id,
            });
        }
        let id = datasource.id.clone();
        tables.datasources.insert(id.clone(), datasource);
        self.commit(&mut tables, |t| {
            t.datasources.shift_remove(&id);
        })
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn get_metric(
        &self,
        organization: &str,
        id: &str,
        include_archived: bool,
    ) -> Result<Option<Metric>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .metrics
            .get(id)
            .filter(|m| m.organization == organization && (include_archived || !m.archived))
            .cloned())
    }

    async fn list_metrics(&self, organization: &str, filter: &MetricFilter) -> Result<Vec<Metric>, StorageError> {
        let tables = self.tables.read().await;
        let items = tables
            .metrics
            .values()
            .filter(|m| m.organization == organization && filter.matches(m))
            .cloned()
            .collect();
        Ok(sorted_by_creation(items, |m: &Metric| (m.date_created, m.id.clone())))
    }

    async fn insert_metric(&self, metric: Metric) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.metrics.contains_key(&metric.id) {
            return Err(StorageError::Conflict {
                field: "id",
                value: metric.id,
            });
        }
        let id = metric.id.clone();
        tables.metrics.insert(id.clone(), metric);
        self.commit(&mut tables, |t| {
            t.metrics.shift_remove(&id);
        })
    }

    async fn delete_metric(&self, organization: &str, id: &str) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .metrics
            .get(id)
            .is_some_and(|m| m.organization == organization);
        if !owned {
            return Ok(false);
        }
        if let Some((index, key, metric)) = tables.metrics.shift_remove_full(id) {
            self.commit(&mut tables, |t| {
                t.metrics.shift_insert(index, key, metric);
            })?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests;
