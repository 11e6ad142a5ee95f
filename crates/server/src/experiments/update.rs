//! The experiment update workflow.
//!
//! Every check runs before the single store write, so any failure leaves
//! the experiment untouched and emits nothing. After the write, audit events
//! go out in a fixed order: the archive transition (if the flag flipped),
//! then `experiment.update`, both carrying the same diff.

use tracing::{debug, info};

use flagdeck_core::audit::audit_details_update;
use flagdeck_core::{
    ApiExperiment, AuditEntity, AuditEvent, AuditedOperation, EntityKind, EventKind, Experiment,
    ExperimentChanges, ExperimentResponse, FlagdeckError, RequestContext, UpdateExperimentPayload,
    ValidationError,
};

use crate::audit::record;
use crate::state::AppState;

pub async fn update_experiment(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    payload: UpdateExperimentPayload,
) -> Result<ExperimentResponse, FlagdeckError> {
    let experiment = state
        .experiments
        .get_experiment(&ctx.organization, id)
        .await?
        .ok_or_else(|| FlagdeckError::not_found(EntityKind::Experiment, id))?;

    let changes = payload.into_changes();
    state
        .permissions
        .require(state.permissions.can_update_experiment(ctx, &experiment, &changes))?;

    validate_changes(state, ctx, &experiment, &changes).await?;

    let updated = state
        .experiments
        .update_experiment(ctx, &experiment, &changes)
        .await?
        .ok_or_else(|| {
            FlagdeckError::Internal(format!("experiment {} vanished during update", experiment.id))
        })?;
    info!(
        experiment_id = %updated.id,
        organization = %ctx.organization,
        user = %ctx.user_id(),
        "Experiment updated"
    );

    if state.audit_policy.requires(AuditedOperation::ExperimentUpdate) {
        let details = audit_details_update(&experiment, &updated);
        if let Some(kind) = EventKind::archive_transition(experiment.archived, updated.archived) {
            record(state, ctx, event(kind, &updated, &details)).await;
        }
        record(state, ctx, event(EventKind::ExperimentUpdate, &updated, &details)).await;
    }

    Ok(ExperimentResponse {
        experiment: ApiExperiment::from(&updated),
    })
}

fn event(kind: EventKind, experiment: &Experiment, details: &str) -> AuditEvent {
    AuditEvent {
        event: kind,
        entity: AuditEntity::experiment(&experiment.id),
        details: details.to_string(),
    }
}

/// Checks that need the data source or other experiments.
async fn validate_changes(
    state: &AppState,
    ctx: &RequestContext,
    experiment: &Experiment,
    changes: &ExperimentChanges,
) -> Result<(), FlagdeckError> {
    let datasource = state
        .datasources
        .get_datasource(&ctx.organization, &experiment.datasource)
        .await?
        .ok_or_else(|| {
            FlagdeckError::InvalidState(format!(
                "datasource {} for experiment {} does not exist",
                experiment.datasource, experiment.id
            ))
        })?;

    if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ValidationError::EmptyField("name").into());
    }
    if changes.tracking_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        return Err(ValidationError::EmptyField("trackingKey").into());
    }

    if let Some(query_id) = &changes.exposure_query_id {
        if *query_id != experiment.exposure_query_id && !datasource.has_exposure_query(query_id) {
            debug!(experiment_id = %experiment.id, query_id = %query_id, "Unknown assignment query");
            return Err(ValidationError::UnknownAssignmentQuery(query_id.clone()).into());
        }
    }

    if let Some(key) = &changes.tracking_key {
        if *key != experiment.tracking_key {
            let existing = state
                .experiments
                .get_experiment_by_tracking_key(&ctx.organization, key)
                .await?;
            if existing.is_some_and(|other| other.id != experiment.id) {
                return Err(ValidationError::DuplicateTrackingKey(key.clone()).into());
            }
        }
    }

    Ok(())
}
