//! PostgreSQL backend. Entities are stored whole as JSONB, alongside the
//! columns used for scoping, uniqueness, and ordering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};

use flagdeck_core::audit::{AuditEntity, AuditError, AuditEvent, AuditRecord, AuditRecorder, EventKind};
use flagdeck_core::config::PostgresConfig;
use flagdeck_core::{DataSource, Experiment, ExperimentChanges, Metric, MetricFilter, RequestContext};

use crate::backend::{DataSourceStore, ExperimentFilter, ExperimentStore, MetricStore};
use crate::error::StorageError;

const TRACKING_KEY_CONSTRAINT: &str = "experiments_organization_tracking_key_key";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply pending migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        if !config.is_configured() {
            return Err(StorageError::NotConfigured(
                "PG_USERNAME must be set for the postgres backend".into(),
            ));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!("PostgreSQL connected: {}:{}/{}", config.host, config.port, config.database);

        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("Database migrations applied successfully");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translate unique violations into [`StorageError::Conflict`].
fn map_write_error(e: sqlx::Error, id: &str, tracking_key: Option<&str>) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return match (db.constraint(), tracking_key) {
                (Some(TRACKING_KEY_CONSTRAINT), Some(key)) => StorageError::Conflict {
                    field: "tracking_key",
                    value: key.to_string(),
                },
                _ => StorageError::Conflict {
                    field: "id",
                    value: id.to_string(),
                },
            };
        }
    }
    StorageError::Database(e)
}

#[async_trait]
impl ExperimentStore for PgStore {
    async fn get_experiment(&self, organization: &str, id: &str) -> Result<Option<Experiment>, StorageError> {
        let row = sqlx::query_as::<_, (Json<Experiment>,)>(
            "SELECT data FROM experiments WHERE organization = $1 AND id = $2",
        )
        .bind(organization)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(e),)| e))
    }

    async fn get_experiment_by_tracking_key(
        &self,
        organization: &str,
        tracking_key: &str,
    ) -> Result<Option<Experiment>, StorageError> {
        let row = sqlx::query_as::<_, (Json<Experiment>,)>(
            "SELECT data FROM experiments WHERE organization = $1 AND tracking_key = $2",
        )
        .bind(organization)
        .bind(tracking_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(e),)| e))
    }

    async fn list_experiments(
        &self,
        organization: &str,
        filter: &ExperimentFilter,
    ) -> Result<Vec<Experiment>, StorageError> {
        let rows = sqlx::query_as::<_, (Json<Experiment>,)>(
            "SELECT data FROM experiments
             WHERE organization = $1
               AND ($2::text IS NULL OR project = $2)
               AND ($3::text IS NULL OR datasource = $3)
             ORDER BY date_created, id",
        )
        .bind(organization)
        .bind(filter.project.as_deref())
        .bind(filter.datasource.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(e),)| e).collect())
    }

    async fn insert_experiment(&self, experiment: Experiment) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO experiments
                (id, organization, project, tracking_key, datasource, date_created, data)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&experiment.id)
        .bind(&experiment.organization)
        .bind(experiment.project.as_deref())
        .bind(&experiment.tracking_key)
        .bind(&experiment.datasource)
        .bind(experiment.date_created)
        .bind(Json(&experiment))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &experiment.id, Some(&experiment.tracking_key)))?;
        Ok(())
    }

    async fn update_experiment(
        &self,
        ctx: &RequestContext,
        experiment: &Experiment,
        changes: &ExperimentChanges,
    ) -> Result<Option<Experiment>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (Json<Experiment>,)>(
            "SELECT data FROM experiments WHERE organization = $1 AND id = $2 FOR UPDATE",
        )
        .bind(&experiment.organization)
        .bind(&experiment.id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((Json(current),)) = current else {
            return Ok(None);
        };

        let updated = changes.apply(&current, Utc::now());
        sqlx::query(
            "UPDATE experiments SET project = $3, tracking_key = $4, data = $5
             WHERE organization = $1 AND id = $2",
        )
        .bind(&updated.organization)
        .bind(&updated.id)
        .bind(updated.project.as_deref())
        .bind(&updated.tracking_key)
        .bind(Json(&updated))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &updated.id, Some(&updated.tracking_key)))?;

        tx.commit().await?;
        debug!(experiment = %updated.id, user = %ctx.user_id(), "Experiment updated");
        Ok(Some(updated))
    }
}

#[async_trait]
impl DataSourceStore for PgStore {
    async fn get_datasource(&self, organization: &str, id: &str) -> Result<Option<DataSource>, StorageError> {
        let row = sqlx::query_as::<_, (Json<DataSource>,)>(
            "SELECT data FROM datasources WHERE organization = $1 AND id = $2",
        )
        .bind(organization)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(d),)| d))
    }

    async fn insert_datasource(&self, datasource: DataSource) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO datasources (id, organization, data) VALUES ($1, $2, $3)")
            .bind(&datasource.id)
            .bind(&datasource.organization)
            .bind(Json(&datasource))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &datasource.id, None))?;
        Ok(())
    }
}

#[async_trait]
impl MetricStore for PgStore {
    async fn get_metric(
        &self,
        organization: &str,
        id: &str,
        include_archived: bool,
    ) -> Result<Option<Metric>, StorageError> {
        let row = sqlx::query_as::<_, (Json<Metric>,)>(
            "SELECT data FROM metrics
             WHERE organization = $1 AND id = $2 AND ($3 OR NOT archived)",
        )
        .bind(organization)
        .bind(id)
        .bind(include_archived)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(m),)| m))
    }

    async fn list_metrics(&self, organization: &str, filter: &MetricFilter) -> Result<Vec<Metric>, StorageError> {
        let rows = sqlx::query_as::<_, (Json<Metric>,)>(
            "SELECT data FROM metrics
             WHERE organization = $1
               AND ($2 OR NOT archived)
               AND ($3::text IS NULL OR datasource = $3)
             ORDER BY date_created, id",
        )
        .bind(organization)
        .bind(filter.include_archived)
        .bind(filter.datasource.as_deref())
        .fetch_all(&self.pool)
        .await?;
        // Project scoping treats an empty project list as "all projects",
        // which is simpler to express on the decoded entity.
        Ok(rows
            .into_iter()
            .map(|(Json(m),)| m)
            .filter(|m| filter.matches(m))
            .collect())
    }

    async fn insert_metric(&self, metric: Metric) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO metrics (id, organization, datasource, archived, date_created, data)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&metric.id)
        .bind(&metric.organization)
        .bind(&metric.datasource)
        .bind(metric.archived)
        .bind(metric.date_created)
        .bind(Json(&metric))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &metric.id, None))?;
        Ok(())
    }

    async fn delete_metric(&self, organization: &str, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM metrics WHERE organization = $1 AND id = $2")
            .bind(organization)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

type AuditRow = (String, String, String, String, String, String, String, DateTime<Utc>);

fn record_from_row(row: AuditRow) -> Result<AuditRecord, AuditError> {
    let (id, organization, user, event, object, entity_id, details, date_created) = row;
    let event: EventKind = serde_json::from_value(serde_json::Value::String(event))?;
    Ok(AuditRecord {
        id,
        organization,
        user,
        event,
        entity: AuditEntity { object, id: entity_id },
        details,
        date_created,
    })
}

#[async_trait]
impl AuditRecorder for PgStore {
    async fn append(&self, ctx: &RequestContext, event: AuditEvent) -> Result<(), AuditError> {
        let record = AuditRecord::from_event(ctx, event);
        sqlx::query(
            "INSERT INTO audit_events
                (id, organization, user_id, event, object, entity_id, details, date_created)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.id)
        .bind(&record.organization)
        .bind(&record.user)
        .bind(record.event.as_str())
        .bind(&record.entity.object)
        .bind(&record.entity.id)
        .bind(&record.details)
        .bind(record.date_created)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Unavailable(e.to_string()))?;
        info!(
            event = %record.event,
            object = %record.entity.object,
            entity_id = %record.entity.id,
            organization = %record.organization,
            user = %record.user,
            "audit"
        );
        Ok(())
    }

    async fn history(
        &self,
        organization: &str,
        entity: &AuditEntity,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT id, organization, user_id, event, object, entity_id, details, date_created
             FROM audit_events
             WHERE organization = $1 AND object = $2 AND entity_id = $3
             ORDER BY date_created DESC, seq DESC
             LIMIT $4",
        )
        .bind(organization)
        .bind(&entity.object)
        .bind(&entity.id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuditError::Unavailable(e.to_string()))?;
        rows.into_iter().map(record_from_row).collect()
    }
}
