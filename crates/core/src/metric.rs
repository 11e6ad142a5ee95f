use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Binomial,
    Count,
    Duration,
    Revenue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub id: String,
    pub organization: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub datasource: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Filters accepted by metric listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricFilter {
    pub datasource: Option<String>,
    pub project: Option<String>,
    pub include_archived: bool,
}

impl MetricFilter {
    pub fn matches(&self, metric: &Metric) -> bool {
        if metric.archived && !self.include_archived {
            return false;
        }
        if let Some(ds) = &self.datasource {
            if &metric.datasource != ds {
                return false;
            }
        }
        if let Some(p) = &self.project {
            // Metrics without projects are visible in every project.
            if !metric.projects.is_empty() && !metric.projects.contains(p) {
                return false;
            }
        }
        true
    }
}

/// Body accepted by `POST /metrics`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostMetricPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub datasource_id: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
}

impl PostMetricPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.datasource_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("datasourceId"));
        }
        Ok(())
    }

    pub fn into_metric(self, id: String, organization: &str, now: DateTime<Utc>) -> Metric {
        Metric {
            id,
            organization: organization.to_string(),
            name: self.name.trim().to_string(),
            description: self.description,
            datasource: self.datasource_id,
            metric_type: self.metric_type,
            owner: self.owner,
            tags: self.tags,
            projects: self.projects,
            archived: false,
            date_created: now,
            date_updated: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetric {
    pub id: String,
    pub name: String,
    pub description: String,
    pub datasource_id: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub owner: String,
    pub tags: Vec<String>,
    pub projects: Vec<String>,
    pub archived: bool,
    pub date_created: String,
    pub date_updated: String,
}

impl From<&Metric> for ApiMetric {
    fn from(m: &Metric) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            description: m.description.clone(),
            datasource_id: m.datasource.clone(),
            metric_type: m.metric_type,
            owner: m.owner.clone(),
            tags: m.tags.clone(),
            projects: m.projects.clone(),
            archived: m.archived,
            date_created: m.date_created.to_rfc3339(),
            date_updated: m.date_updated.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricResponse {
    pub metric: ApiMetric,
}
