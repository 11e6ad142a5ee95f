use serde::Serialize;

use flagdeck_core::ApiExperiment;

use crate::api::PageInfo;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ExperimentListResponse {
    pub experiments: Vec<ApiExperiment>,
    #[serde(flatten)]
    pub page: PageInfo,
}
