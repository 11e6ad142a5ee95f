//! Audit event types, the per-operation audit policy, and the recorder seam.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum EventKind {
    #[serde(rename = "experiment.update")]
    ExperimentUpdate,
    #[serde(rename = "experiment.archive")]
    ExperimentArchive,
    #[serde(rename = "experiment.unarchive")]
    ExperimentUnarchive,
    #[serde(rename = "metric.create")]
    MetricCreate,
    #[serde(rename = "metric.delete")]
    MetricDelete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ExperimentUpdate => "experiment.update",
            EventKind::ExperimentArchive => "experiment.archive",
            EventKind::ExperimentUnarchive => "experiment.unarchive",
            EventKind::MetricCreate => "metric.create",
            EventKind::MetricDelete => "metric.delete",
        }
    }

    /// Archive-transition event for an `archived` flag going from `before`
    /// to `after`, if it flipped.
    pub fn archive_transition(before: bool, after: bool) -> Option<EventKind> {
        match (before, after) {
            (false, true) => Some(EventKind::ExperimentArchive),
            (true, false) => Some(EventKind::ExperimentUnarchive),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuditEntity {
    pub object: String,
    pub id: String,
}

impl AuditEntity {
    pub fn experiment(id: impl Into<String>) -> Self {
        Self {
            object: "experiment".into(),
            id: id.into(),
        }
    }

    pub fn metric(id: impl Into<String>) -> Self {
        Self {
            object: "metric".into(),
            id: id.into(),
        }
    }
}

/// What a workflow hands to the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuditEvent {
    pub event: EventKind,
    pub entity: AuditEntity,
    pub details: String,
}

/// Persisted form of an [`AuditEvent`], stamped with who and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub organization: String,
    pub user: String,
    pub event: EventKind,
    pub entity: AuditEntity,
    pub details: String,
    #[schema(value_type = String)]
    pub date_created: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_event(ctx: &RequestContext, event: AuditEvent) -> Self {
        Self {
            id: format!("aud_{}", uuid::Uuid::new_v4().simple()),
            organization: ctx.organization.clone(),
            user: ctx.actor.user_id.clone(),
            event: event.event,
            entity: event.entity,
            details: event.details,
            date_created: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Appends audit events. Workflows await the call but never roll back a
/// committed write when it fails.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn append(&self, ctx: &RequestContext, event: AuditEvent) -> Result<(), AuditError>;

    /// Records for one entity, newest first.
    async fn history(
        &self,
        organization: &str,
        entity: &AuditEntity,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, AuditError>;
}

/// Operations whose audit coverage is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditedOperation {
    ExperimentUpdate,
    MetricCreate,
    MetricDelete,
}

/// Which operations emit audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPolicy {
    pub experiment_update: bool,
    pub metric_create: bool,
    pub metric_delete: bool,
}

impl AuditPolicy {
    pub fn requires(&self, op: AuditedOperation) -> bool {
        match op {
            AuditedOperation::ExperimentUpdate => self.experiment_update,
            AuditedOperation::MetricCreate => self.metric_create,
            AuditedOperation::MetricDelete => self.metric_delete,
        }
    }

    pub fn all() -> Self {
        Self {
            experiment_update: true,
            metric_create: true,
            metric_delete: true,
        }
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            experiment_update: true,
            metric_create: false,
            metric_delete: false,
        }
    }
}

/// Field keys never reported in update diffs.
const DIFF_IGNORED_FIELDS: &[&str] = &["dateUpdated"];

/// Describe an update as `{"pre": {...}, "post": {...}}`, listing only the
/// fields whose serialized value changed.
pub fn audit_details_update<T: Serialize>(pre: &T, post: &T) -> String {
    let pre = serde_json::to_value(pre).unwrap_or(Value::Null);
    let post = serde_json::to_value(post).unwrap_or(Value::Null);

    let mut pre_changed = Map::new();
    let mut post_changed = Map::new();

    if let (Value::Object(pre_map), Value::Object(post_map)) = (&pre, &post) {
        for (key, old) in pre_map {
            if DIFF_IGNORED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let new = post_map.get(key).unwrap_or(&Value::Null);
            if old != new {
                pre_changed.insert(key.clone(), old.clone());
                post_changed.insert(key.clone(), new.clone());
            }
        }
        for (key, new) in post_map {
            if !pre_map.contains_key(key) && !DIFF_IGNORED_FIELDS.contains(&key.as_str()) {
                pre_changed.insert(key.clone(), Value::Null);
                post_changed.insert(key.clone(), new.clone());
            }
        }
    } else if pre != post {
        return serde_json::json!({ "pre": pre, "post": post }).to_string();
    }

    serde_json::json!({ "pre": pre_changed, "post": post_changed }).to_string()
}

/// Describe a created or deleted entity as `{"pre"|"post": entity}`.
pub fn audit_details_snapshot<T: Serialize>(key: &str, entity: &T) -> String {
    let value = serde_json::to_value(entity).unwrap_or(Value::Null);
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map).to_string()
}
