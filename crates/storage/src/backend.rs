//! Entity Store traits. Every lookup is scoped to an organization.

use async_trait::async_trait;

use flagdeck_core::{DataSource, Experiment, ExperimentChanges, Metric, MetricFilter, RequestContext};

use crate::error::StorageError;

/// Filters accepted by experiment listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentFilter {
    pub project: Option<String>,
    pub datasource: Option<String>,
}

impl ExperimentFilter {
    pub fn matches(&self, experiment: &Experiment) -> bool {
        if let Some(p) = &self.project {
            if experiment.project.as_deref() != Some(p.as_str()) {
                return false;
            }
        }
        if let Some(ds) = &self.datasource {
            if &experiment.datasource != ds {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ExperimentStore: Send + Sync {
    async fn get_experiment(&self, organization: &str, id: &str) -> Result<Option<Experiment>, StorageError>;

    async fn get_experiment_by_tracking_key(
        &self,
        organization: &str,
        tracking_key: &str,
    ) -> Result<Option<Experiment>, StorageError>;

    /// Ordered by creation date, then id.
    async fn list_experiments(
        &self,
        organization: &str,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StorageError>;

    /// Fails with [`StorageError::Conflict`] on a duplicate id or tracking key.
    async fn insert_experiment(&self, experiment: Experiment) -> Result<(), StorageError>;

    /// Apply `changes` atomically. Returns `Ok(None)` when the experiment no
    /// longer exists, and [`StorageError::Conflict`] when the new tracking key
    /// is already taken by another experiment in the organization.
    async fn update_experiment(
        &self,
        ctx: &RequestContext,
        experiment: &Experiment,
        changes: &ExperimentChanges,
    ) -> Result<Option<Experiment>, StorageError>;
}

#[async_trait]
pub trait DataSourceStore: Send + Sync {
    async fn get_datasource(&self, organization: &str, id: &str) -> Result<Option<DataSource>, StorageError>;

    async fn insert_datasource(&self, datasource: DataSource) -> Result<(), StorageError>;
}

#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn get_metric(
        &self,
        organization: &str,
        id: &str,
        include_archived: bool,
    ) -> Result<Option<Metric>, StorageError>;

    /// Ordered by creation date, then id.
    async fn list_metrics(&self, organization: &str, filter: &MetricFilter) -> Result<Vec<Metric>, StorageError>;

    async fn insert_metric(&self, metric: Metric) -> Result<(), StorageError>;

    /// Returns whether a metric was removed.
    async fn delete_metric(&self, organization: &str, id: &str) -> Result<bool, StorageError>;
}
