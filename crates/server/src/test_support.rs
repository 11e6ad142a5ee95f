//! Fixtures shared by the workflow tests: an instrumented store, canned
//! entities, and permission/audit doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use flagdeck_core::audit::{AuditEntity, AuditError, AuditEvent, AuditRecord, AuditRecorder};
use flagdeck_core::{
    AuditLog, AuditPolicy, Config, DataSource, EventKind, Experiment, ExperimentChanges, ExperimentStatus,
    Metric, MetricFilter, MetricType, PermissionEvaluator, Permissions, RequestContext, Role, RolePolicy,
};
use flagdeck_storage::{
    DataSourceStore, ExperimentFilter, ExperimentStore, MemoryStore, MetricStore, StorageError,
};

use crate::state::AppState;

/// Memory store that counts mutations. It can also be told to lose the
/// experiment between read and write, or to hide tracking keys from lookups
/// so only the write path sees a collision.
#[derive(Default)]
pub(crate) struct CountingStore {
    pub inner: MemoryStore,
    pub experiment_writes: AtomicUsize,
    pub metric_deletes: AtomicUsize,
    vanish_on_update: AtomicBool,
    hide_tracking_keys: AtomicBool,
}

impl CountingStore {
    pub fn vanish_on_update(&self) {
        self.vanish_on_update.store(true, Ordering::SeqCst);
    }

    pub fn hide_tracking_keys(&self) {
        self.hide_tracking_keys.store(true, Ordering::SeqCst);
    }

    pub fn experiment_writes(&self) -> usize {
        self.experiment_writes.load(Ordering::SeqCst)
    }

    pub fn metric_deletes(&self) -> usize {
        self.metric_deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExperimentStore for CountingStore {
    async fn get_experiment(&self, organization: &str, id: &str) -> Result<Option<Experiment>, StorageError> {
        self.inner.get_experiment(organization, id).await
    }

    async fn get_experiment_by_tracking_key(
        &self,
        organization: &str,
        tracking_key: &str,
    ) -> Result<Option<Experiment>, StorageError> {
        if self.hide_tracking_keys.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_experiment_by_tracking_key(organization, tracking_key).await
    }

    async fn list_experiments(
        &self,
        organization: &str,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StorageError> {
        self.inner.list_experiments(organization, filter).await
    }

    async fn insert_experiment(&self, experiment: Experiment) -> Result<(), StorageError> {
        self.inner.insert_experiment(experiment).await
    }

    async fn update_experiment(
        &self,
        ctx: &RequestContext,
        experiment: &Experiment,
        changes: &ExperimentChanges,
    ) -> Result<Option<Experiment>, StorageError> {
        self.experiment_writes.fetch_add(1, Ordering::SeqCst);
        if self.vanish_on_update.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.update_experiment(ctx, experiment, changes).await
    }
}

#[async_trait]
impl MetricStore for CountingStore {
    async fn get_metric(
        &self,
        organization: &str,
        id: &str,
        include_archived: bool,
    ) -> Result<Option<Metric>, StorageError> {
        self.inner.get_metric(organization, id, include_archived).await
    }

    async fn list_metrics(&self, organization: &str, filter: &MetricFilter) -> Result<Vec<Metric>, StorageError> {
        self.inner.list_metrics(organization, filter).await
    }

    async fn insert_metric(&self, metric: Metric) -> Result<(), StorageError> {
        self.inner.insert_metric(metric).await
    }

    async fn delete_metric(&self, organization: &str, id: &str) -> Result<bool, StorageError> {
        self.metric_deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_metric(organization, id).await
    }
}

#[async_trait]
impl DataSourceStore for CountingStore {
    async fn get_datasource(&self, organization: &str, id: &str) -> Result<Option<DataSource>, StorageError> {
        self.inner.get_datasource(organization, id).await
    }

    async fn insert_datasource(&self, datasource: DataSource) -> Result<(), StorageError> {
        self.inner.insert_datasource(datasource).await
    }
}

pub(crate) struct DenyAll;

impl PermissionEvaluator for DenyAll {
    fn can_update_experiment(&self, _: &RequestContext, _: &Experiment, _: &ExperimentChanges) -> bool {
        false
    }

    fn can_create_metric(&self, _: &RequestContext, _: &[String]) -> bool {
        false
    }

    fn can_delete_metric(&self, _: &RequestContext, _: &Metric) -> bool {
        false
    }
}

pub(crate) struct FailingAudit;

#[async_trait]
impl AuditRecorder for FailingAudit {
    async fn append(&self, _: &RequestContext, _: AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("sink offline".into()))
    }

    async fn history(&self, _: &str, _: &AuditEntity, _: usize) -> Result<Vec<AuditRecord>, AuditError> {
        Err(AuditError::Unavailable("sink offline".into()))
    }
}

pub(crate) struct Harness {
    pub state: AppState,
    pub store: Arc<CountingStore>,
    pub audit: AuditLog,
}

impl Harness {
    /// Event kinds appended so far, in order.
    pub fn events(&self) -> Vec<EventKind> {
        self.audit.records().iter().map(|r| r.event).collect()
    }

    pub async fn stored_experiment(&self, id: &str) -> Experiment {
        self.store
            .get_experiment("org_1", id)
            .await
            .unwrap()
            .expect("experiment should exist")
    }
}

/// State over a fresh counting store holding data source `ds_1` (exposure
/// queries `q1`, `q2`) in `org_1`.
pub(crate) async fn harness() -> Harness {
    let store = Arc::new(CountingStore::default());
    store.insert_datasource(datasource("ds_1", "org_1")).await.unwrap();

    let audit = AuditLog::new();
    let state = AppState {
        experiments: store.clone(),
        datasources: store.clone(),
        metrics: store.clone(),
        permissions: Arc::new(RolePolicy),
        audit: Arc::new(audit.clone()),
        audit_policy: AuditPolicy::default(),
        include_archived_metrics: false,
        config: Config::for_profile("test"),
    };
    Harness { state, store, audit }
}

pub(crate) fn ctx(role: Role) -> RequestContext {
    RequestContext::new("u_1", "org_1", Permissions::new(role))
}

pub(crate) fn datasource(id: &str, org: &str) -> DataSource {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "organization": org,
        "name": "Warehouse",
        "type": "postgres",
        "settings": {"queries": {"exposure": [
            {"id": "q1", "name": "Logged in users", "userIdType": "user_id"},
            {"id": "q2", "name": "Anonymous visitors", "userIdType": "anonymous_id"}
        ]}}
    }))
    .unwrap()
}

fn fixed_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-05T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub(crate) fn experiment(id: &str, tracking_key: &str) -> Experiment {
    Experiment {
        id: id.to_string(),
        organization: "org_1".to_string(),
        project: None,
        name: format!("Experiment {}", id),
        tracking_key: tracking_key.to_string(),
        hypothesis: String::new(),
        description: String::new(),
        tags: vec![],
        owner: "u_owner".to_string(),
        datasource: "ds_1".to_string(),
        exposure_query_id: "q1".to_string(),
        hash_attribute: "id".to_string(),
        status: ExperimentStatus::Draft,
        archived: false,
        date_created: fixed_time(),
        date_updated: fixed_time(),
    }
}

pub(crate) fn metric(id: &str, org: &str) -> Metric {
    Metric {
        id: id.to_string(),
        organization: org.to_string(),
        name: format!("Metric {}", id),
        description: String::new(),
        datasource: "ds_1".to_string(),
        metric_type: MetricType::Binomial,
        owner: String::new(),
        tags: vec![],
        projects: vec![],
        archived: false,
        date_created: fixed_time(),
        date_updated: fixed_time(),
    }
}
