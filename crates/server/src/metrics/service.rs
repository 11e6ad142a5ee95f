//! Metric workflows. Lookups honor the `include_archived` setting.

use chrono::Utc;
use tracing::info;

use flagdeck_core::audit::audit_details_snapshot;
use flagdeck_core::{
    ApiMetric, AuditEntity, AuditEvent, AuditedOperation, EntityKind, EventKind, FlagdeckError,
    MetricFilter, MetricResponse, PostMetricPayload, RequestContext, ValidationError,
};

use crate::api::{paginate, ListParams};
use crate::audit::record;
use crate::state::AppState;

use super::types::{DeleteMetricResponse, MetricListResponse};

pub async fn list_metrics(
    state: &AppState,
    ctx: &RequestContext,
    params: &ListParams,
) -> Result<MetricListResponse, FlagdeckError> {
    let filter = MetricFilter {
        datasource: params.datasource_id.clone(),
        project: params.project_id.clone(),
        include_archived: state.include_archived_metrics,
    };
    let all = state.metrics.list_metrics(&ctx.organization, &filter).await?;
    let (page, info) = paginate(all, params.limit, params.offset);
    Ok(MetricListResponse {
        metrics: page.iter().map(ApiMetric::from).collect(),
        page: info,
    })
}

pub async fn get_metric(state: &AppState, ctx: &RequestContext, id: &str) -> Result<MetricResponse, FlagdeckError> {
    let metric = state
        .metrics
        .get_metric(&ctx.organization, id, state.include_archived_metrics)
        .await?
        .ok_or_else(|| FlagdeckError::not_found(EntityKind::Metric, id))?;
    Ok(MetricResponse {
        metric: ApiMetric::from(&metric),
    })
}

pub async fn create_metric(
    state: &AppState,
    ctx: &RequestContext,
    payload: PostMetricPayload,
) -> Result<MetricResponse, FlagdeckError> {
    payload.validate()?;
    state
        .permissions
        .require(state.permissions.can_create_metric(ctx, &payload.projects))?;

    if state
        .datasources
        .get_datasource(&ctx.organization, &payload.datasource_id)
        .await?
        .is_none()
    {
        return Err(ValidationError::UnknownDataSource(payload.datasource_id).into());
    }

    let id = format!("met_{}", uuid::Uuid::new_v4().simple());
    let metric = payload.into_metric(id, &ctx.organization, Utc::now());
    state.metrics.insert_metric(metric.clone()).await?;
    info!(metric_id = %metric.id, organization = %ctx.organization, "Metric created");

    if state.audit_policy.requires(AuditedOperation::MetricCreate) {
        let event = AuditEvent {
            event: EventKind::MetricCreate,
            entity: AuditEntity::metric(&metric.id),
            details: audit_details_snapshot("post", &metric),
        };
        record(state, ctx, event).await;
    }

    Ok(MetricResponse {
        metric: ApiMetric::from(&metric),
    })
}

/// Delete a metric owned by the caller's organization. Metrics of other
/// organizations, and archived ones unless configured otherwise, are
/// reported as not found.
pub async fn delete_metric(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
) -> Result<DeleteMetricResponse, FlagdeckError> {
    let metric = state
        .metrics
        .get_metric(&ctx.organization, id, state.include_archived_metrics)
        .await?
        .ok_or_else(|| FlagdeckError::not_found(EntityKind::Metric, id))?;

    state
        .permissions
        .require(state.permissions.can_delete_metric(ctx, &metric))?;

    if !state.metrics.delete_metric(&ctx.organization, &metric.id).await? {
        return Err(FlagdeckError::not_found(EntityKind::Metric, id));
    }
    info!(metric_id = %metric.id, organization = %ctx.organization, "Metric deleted");

    if state.audit_policy.requires(AuditedOperation::MetricDelete) {
        let event = AuditEvent {
            event: EventKind::MetricDelete,
            entity: AuditEntity::metric(&metric.id),
            details: audit_details_snapshot("pre", &metric),
        };
        record(state, ctx, event).await;
    }

    Ok(DeleteMetricResponse {})
}
