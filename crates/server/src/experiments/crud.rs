use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use flagdeck_core::{
    ApiExperiment, EntityKind, ExperimentResponse, FlagdeckError, UpdateExperimentPayload,
};
use flagdeck_storage::ExperimentFilter;

use crate::api::{paginate, ApiResult, Ctx, ListParams};
use crate::state::AppState;

use super::types::ExperimentListResponse;

/// List experiments in the caller's organization, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/experiments",
    tag = "Experiments",
    params(ListParams),
    responses(
        (status = 200, description = "One page of experiments", body = ExperimentListResponse),
        (status = 401, description = "Missing request context", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn list_experiments(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ExperimentListResponse>> {
    let filter = ExperimentFilter {
        project: params.project_id.clone(),
        datasource: params.datasource_id.clone(),
    };
    let all = state
        .experiments
        .list_experiments(&ctx.organization, &filter)
        .await
        .map_err(FlagdeckError::from)?;
    let (page, info) = paginate(all, params.limit, params.offset);
    Ok(Json(ExperimentListResponse {
        experiments: page.iter().map(ApiExperiment::from).collect(),
        page: info,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/experiments/{id}",
    tag = "Experiments",
    params(("id" = String, Path, description = "Experiment id")),
    responses(
        (status = 200, description = "Experiment", body = ExperimentResponse),
        (status = 404, description = "Experiment not found", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn get_experiment(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> ApiResult<Json<ExperimentResponse>> {
    let experiment = state
        .experiments
        .get_experiment(&ctx.organization, &id)
        .await
        .map_err(FlagdeckError::from)?
        .ok_or_else(|| FlagdeckError::not_found(EntityKind::Experiment, &id))?;
    Ok(Json(ExperimentResponse {
        experiment: ApiExperiment::from(&experiment),
    }))
}

/// Partially update an experiment.
///
/// Returns 400 for an unknown assignment query, 409 when the tracking key
/// belongs to another experiment, 403 when the caller may not edit it.
#[utoipa::path(
    put,
    path = "/api/v1/experiments/{id}",
    tag = "Experiments",
    params(("id" = String, Path, description = "Experiment id")),
    request_body = UpdateExperimentPayload,
    responses(
        (status = 200, description = "Updated experiment", body = ExperimentResponse),
        (status = 400, description = "Validation failed", body = crate::api::ErrorResponse),
        (status = 403, description = "Permission denied", body = crate::api::ErrorResponse),
        (status = 404, description = "Experiment not found", body = crate::api::ErrorResponse),
        (status = 409, description = "Tracking key already in use", body = crate::api::ErrorResponse)
    )
)]
pub(crate) async fn put_experiment(
    State(state): State<Arc<AppState>>,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
    Json(payload): Json<UpdateExperimentPayload>,
) -> ApiResult<Json<ExperimentResponse>> {
    let response = super::update_experiment(&state, &ctx, &id, payload).await?;
    Ok(Json(response))
}
