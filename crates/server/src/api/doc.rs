//! OpenAPI documentation aggregator, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "flagdeck API",
        version = "0.1.0",
        description = "Experiment updates, metric management, and audit history for feature-flag projects.",
    ),
    tags(
        (name = "Health", description = "Server liveness"),
        (name = "Experiments", description = "Experiment reads and audited partial updates"),
        (name = "Metrics", description = "Metric CRUD scoped to the caller's organization"),
        (name = "Audit", description = "Per-entity audit history"),
    ),
    paths(
        // Health
        crate::api::health::health,
        // Experiments
        crate::experiments::list_experiments,
        crate::experiments::get_experiment,
        crate::experiments::put_experiment,
        // Metrics
        crate::metrics::list_metrics_handler,
        crate::metrics::get_metric_handler,
        crate::metrics::post_metric,
        crate::metrics::delete_metric_handler,
        // Audit
        crate::audit::audit_history,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::ErrorBody,
        crate::api::PageInfo,
        flagdeck_core::ApiExperiment,
        flagdeck_core::ExperimentStatus,
        flagdeck_core::UpdateExperimentPayload,
        flagdeck_core::ApiMetric,
        flagdeck_core::MetricType,
        flagdeck_core::PostMetricPayload,
    ))
)]
pub struct ApiDoc;
