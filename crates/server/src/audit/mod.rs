//! Audit emission helper and the audit history endpoint.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use flagdeck_core::audit::AuditRecord;
use flagdeck_core::{AuditEntity, AuditEvent, FlagdeckError, RequestContext};

use crate::api::{ApiResult, Ctx};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

/// Append one event. The write it describes has already committed, so a
/// failed append is logged and swallowed.
pub async fn record(state: &AppState, ctx: &RequestContext, event: AuditEvent) {
    let kind = event.event;
    let entity_id = event.entity.id.clone();
    if let Err(e) = state.audit.append(ctx, event).await {
        warn!(event = %kind, entity_id = %entity_id, error = %e, "Failed to append audit event");
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Maximum number of records (default 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuditHistoryResponse {
    pub events: Vec<AuditRecord>,
}

/// Audit records for one entity, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/audit/{object}/{id}",
    tag = "Audit",
    params(
        ("object" = String, Path, description = "Entity type, e.g. experiment or metric"),
        ("id" = String, Path, description = "Entity id"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "Audit records", body = AuditHistoryResponse),
        (status = 401, description = "Missing request context", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn audit_history(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Path((object, id)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<AuditHistoryResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    let entity = AuditEntity { object, id };
    let events = state
        .audit
        .history(&ctx.organization, &entity, limit)
        .await
        .map_err(|e| FlagdeckError::Internal(e.to_string()))?;
    Ok(Json(AuditHistoryResponse { events }))
}

pub fn audit_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/audit/{object}/{id}", get(audit_history))
}
