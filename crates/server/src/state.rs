use std::sync::Arc;

use flagdeck_core::{AuditPolicy, AuditRecorder, Config, PermissionEvaluator, RolePolicy};
use flagdeck_storage::{DataSourceStore, ExperimentStore, MetricStore, StorageEngine};

/// Shared state handed to every handler. Collaborators sit behind trait
/// objects so tests can swap in instrumented stores.
pub struct AppState {
    pub experiments: Arc<dyn ExperimentStore>,
    pub datasources: Arc<dyn DataSourceStore>,
    pub metrics: Arc<dyn MetricStore>,
    pub permissions: Arc<dyn PermissionEvaluator>,
    pub audit: Arc<dyn AuditRecorder>,
    pub audit_policy: AuditPolicy,
    /// Whether metric lookups see archived metrics.
    pub include_archived_metrics: bool,
    pub config: Config,
}

impl AppState {
    pub fn new(storage: StorageEngine, config: Config) -> Self {
        Self {
            experiments: storage.experiments,
            datasources: storage.datasources,
            metrics: storage.metrics,
            permissions: Arc::new(RolePolicy),
            audit: storage.audit,
            audit_policy: config.audit.policy(),
            include_archived_metrics: config.metrics.include_archived,
            config,
        }
    }
}
