//! In-memory audit log with per-entity FIFO eviction.
//!
//! Records are kept per `(organization, object, id)` and capped at a
//! configurable maximum (default 500). A separate global append sequence,
//! capped on its own (default 10 000), lets callers read events back in the
//! order they were emitted. Both caps evict from the front in constant time.
//! Uses `std::sync::RwLock` so it can be read from sync and async code.
//!
//! The log lives only in process memory. The memory storage backend does
//! not write it to its snapshot, so audit history starts empty on every
//! restart; use the postgres backend when history must survive restarts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::info;

use crate::audit::{AuditEntity, AuditError, AuditEvent, AuditRecord, AuditRecorder};
use crate::context::RequestContext;

type EntityKey = (String, String, String);

#[derive(Default)]
struct Inner {
    by_entity: HashMap<EntityKey, VecDeque<AuditRecord>>,
    sequence: VecDeque<AuditRecord>,
}

#[derive(Clone)]
pub struct AuditLog {
    inner: Arc<RwLock<Inner>>,
    max_entries_per_entity: usize,
    max_sequence: usize,
}

const DEFAULT_MAX_SEQUENCE: usize = 10_000;

impl AuditLog {
    /// Create a new audit log with the default cap of 500 entries per entity.
    pub fn new() -> Self {
        Self::with_max_entries(500)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            max_entries_per_entity: max.max(1),
            max_sequence: DEFAULT_MAX_SEQUENCE,
        }
    }

    /// Cap on the global append sequence behind [`AuditLog::records`].
    pub fn with_max_sequence(mut self, max: usize) -> Self {
        self.max_sequence = max.max(1);
        self
    }

    /// The most recent appends across all entities, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.sequence.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(organization: &str, entity: &AuditEntity) -> EntityKey {
        (organization.to_string(), entity.object.clone(), entity.id.clone())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditRecorder for AuditLog {
    async fn append(&self, ctx: &RequestContext, event: AuditEvent) -> Result<(), AuditError> {
        let record = AuditRecord::from_event(ctx, event);
        info!(
            event = %record.event,
            object = %record.entity.object,
            entity_id = %record.entity.id,
            organization = %record.organization,
            user = %record.user,
            "audit"
        );

        let mut guard = self
            .inner
            .write()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".into()))?;
        let key = Self::key(&record.organization, &record.entity);

        let deque = guard.by_entity.entry(key).or_default();
        deque.push_back(record.clone());
        while deque.len() > self.max_entries_per_entity {
            deque.pop_front();
        }

        guard.sequence.push_back(record);
        while guard.sequence.len() > self.max_sequence {
            guard.sequence.pop_front();
        }
        Ok(())
    }

    async fn history(
        &self,
        organization: &str,
        entity: &AuditEntity,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".into()))?;
        let Some(deque) = guard.by_entity.get(&Self::key(organization, entity)) else {
            return Ok(Vec::new());
        };
        Ok(deque.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EventKind;
    use crate::permissions::{Permissions, Role};

    fn ctx(org: &str) -> RequestContext {
        RequestContext::new("u_1", org, Permissions::new(Role::Admin))
    }

    fn event(kind: EventKind, id: &str) -> AuditEvent {
        AuditEvent {
            event: kind,
            entity: AuditEntity::experiment(id),
            details: "{}".into(),
        }
    }

    #[tokio::test]
    async fn history_is_newest_first_and_scoped() {
        let log = AuditLog::new();
        log.append(&ctx("org_1"), event(EventKind::ExperimentArchive, "exp_1")).await.unwrap();
        log.append(&ctx("org_1"), event(EventKind::ExperimentUpdate, "exp_1")).await.unwrap();
        log.append(&ctx("org_2"), event(EventKind::ExperimentUpdate, "exp_1")).await.unwrap();

        let hist = log.history("org_1", &AuditEntity::experiment("exp_1"), 10).await.unwrap();
        let kinds: Vec<_> = hist.iter().map(|r| r.event).collect();
        assert_eq!(kinds, vec![EventKind::ExperimentUpdate, EventKind::ExperimentArchive]);
        assert!(hist.iter().all(|r| r.organization == "org_1" && r.user == "u_1"));

        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn evicts_oldest_per_entity() {
        let log = AuditLog::with_max_entries(2);
        for _ in 0..3 {
            log.append(&ctx("org_1"), event(EventKind::ExperimentUpdate, "exp_1")).await.unwrap();
        }
        log.append(&ctx("org_1"), event(EventKind::ExperimentUpdate, "exp_2")).await.unwrap();

        let hist = log.history("org_1", &AuditEntity::experiment("exp_1"), 10).await.unwrap();
        assert_eq!(hist.len(), 2);
        // The global sequence has its own cap.
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn sequence_keeps_most_recent_appends() {
        let log = AuditLog::with_max_entries(10).with_max_sequence(3);
        for id in ["exp_1", "exp_2", "exp_3", "exp_4", "exp_5"] {
            log.append(&ctx("org_1"), event(EventKind::ExperimentUpdate, id)).await.unwrap();
        }

        let ids: Vec<String> = log.records().into_iter().map(|r| r.entity.id).collect();
        assert_eq!(ids, vec!["exp_3", "exp_4", "exp_5"]);
        let hist = log.history("org_1", &AuditEntity::experiment("exp_1"), 10).await.unwrap();
        assert_eq!(hist.len(), 1);
    }

    #[tokio::test]
    async fn limit_caps_history() {
        let log = AuditLog::new();
        for _ in 0..5 {
            log.append(&ctx("org_1"), event(EventKind::ExperimentUpdate, "exp_1")).await.unwrap();
        }
        let hist = log.history("org_1", &AuditEntity::experiment("exp_1"), 2).await.unwrap();
        assert_eq!(hist.len(), 2);
        assert!(log.history("org_1", &AuditEntity::metric("met_1"), 10).await.unwrap().is_empty());
    }
}
