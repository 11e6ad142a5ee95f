use serde::{Deserialize, Serialize};

/// A named query used to determine experiment participant assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureQuery {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_id_type: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceQueries {
    #[serde(default)]
    pub exposure: Vec<ExposureQuery>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSettings {
    #[serde(default)]
    pub queries: DataSourceQueries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub organization: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default)]
    pub settings: DataSourceSettings,
}

impl DataSource {
    pub fn exposure_queries(&self) -> &[ExposureQuery] {
        &self.settings.queries.exposure
    }

    pub fn has_exposure_query(&self, id: &str) -> bool {
        self.exposure_queries().iter().any(|q| q.id == id)
    }
}
