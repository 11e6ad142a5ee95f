use serde::Serialize;

use flagdeck_core::ApiMetric;

use crate::api::PageInfo;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MetricListResponse {
    pub metrics: Vec<ApiMetric>,
    #[serde(flatten)]
    pub page: PageInfo,
}

/// Body of a successful delete: an empty object.
#[derive(Debug, Default, PartialEq, Serialize, utoipa::ToSchema)]
pub struct DeleteMetricResponse {}
