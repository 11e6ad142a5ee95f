use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use flagdeck_core::{MetricResponse, PostMetricPayload};

use crate::api::{ApiResult, Ctx, ListParams};
use crate::state::AppState;

use super::service;
use super::types::{DeleteMetricResponse, MetricListResponse};

#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    tag = "Metrics",
    params(ListParams),
    responses(
        (status = 200, description = "One page of metrics", body = MetricListResponse),
        (status = 401, description = "Missing request context", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn list_metrics_handler(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<MetricListResponse>> {
    Ok(Json(service::list_metrics(&state, &ctx, &params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/metrics/{id}",
    tag = "Metrics",
    params(("id" = String, Path, description = "Metric id")),
    responses(
        (status = 200, description = "Metric", body = MetricResponse),
        (status = 404, description = "Metric not found", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn get_metric_handler(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> ApiResult<Json<MetricResponse>> {
    Ok(Json(service::get_metric(&state, &ctx, &id).await?))
}

/// Create a metric. Needs `ManageMetrics` in every listed project.
#[utoipa::path(
    post,
    path = "/api/v1/metrics",
    tag = "Metrics",
    request_body = PostMetricPayload,
    responses(
        (status = 200, description = "Created metric", body = MetricResponse),
        (status = 400, description = "Validation failed", body = crate::api::ErrorResponse),
        (status = 403, description = "Permission denied", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn post_metric(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Json(payload): Json<PostMetricPayload>,
) -> ApiResult<Json<MetricResponse>> {
    Ok(Json(service::create_metric(&state, &ctx, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/metrics/{id}",
    tag = "Metrics",
    params(("id" = String, Path, description = "Metric id")),
    responses(
        (status = 200, description = "Metric deleted", body = DeleteMetricResponse),
        (status = 403, description = "Permission denied", body = crate::api::ErrorResponse),
        (status = 404, description = "Metric not found", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn delete_metric_handler(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteMetricResponse>> {
    Ok(Json(service::delete_metric(&state, &ctx, &id).await?))
}
