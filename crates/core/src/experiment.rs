//! Experiment entity, its typed change set, and the wire shapes used by the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    #[default]
    Draft,
    Running,
    Stopped,
}

/// Stored form of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub organization: String,
    #[serde(default)]
    pub project: Option<String>,
    pub name: String,
    pub tracking_key: String,
    #[serde(default)]
    pub hypothesis: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owner: String,
    pub datasource: String,
    pub exposure_query_id: String,
    #[serde(default = "default_hash_attribute")]
    pub hash_attribute: String,
    #[serde(default)]
    pub status: ExperimentStatus,
    #[serde(default)]
    pub archived: bool,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

fn default_hash_attribute() -> String {
    "id".to_string()
}

/// Fields an update may touch. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentChanges {
    pub name: Option<String>,
    /// `Some(None)` moves the experiment out of any project.
    pub project: Option<Option<String>>,
    pub tracking_key: Option<String>,
    pub hypothesis: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub owner: Option<String>,
    pub exposure_query_id: Option<String>,
    pub hash_attribute: Option<String>,
    pub status: Option<ExperimentStatus>,
    pub archived: Option<bool>,
}

impl ExperimentChanges {
    pub fn is_empty(&self) -> bool {
        *self == ExperimentChanges::default()
    }

    /// Produce the updated experiment. Only present fields change;
    /// `date_updated` is always refreshed.
    pub fn apply(&self, experiment: &Experiment, now: DateTime<Utc>) -> Experiment {
        let mut next = experiment.clone();
        if let Some(v) = &self.name {
            next.name = v.clone();
        }
        if let Some(v) = &self.project {
            next.project = v.clone();
        }
        if let Some(v) = &self.tracking_key {
            next.tracking_key = v.clone();
        }
        if let Some(v) = &self.hypothesis {
            next.hypothesis = v.clone();
        }
        if let Some(v) = &self.description {
            next.description = v.clone();
        }
        if let Some(v) = &self.tags {
            next.tags = v.clone();
        }
        if let Some(v) = &self.owner {
            next.owner = v.clone();
        }
        if let Some(v) = &self.exposure_query_id {
            next.exposure_query_id = v.clone();
        }
        if let Some(v) = &self.hash_attribute {
            next.hash_attribute = v.clone();
        }
        if let Some(v) = self.status {
            next.status = v;
        }
        if let Some(v) = self.archived {
            next.archived = v;
        }
        next.date_updated = now;
        next
    }
}

/// Partial update body accepted by `PUT /experiments/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExperimentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_query_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExperimentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl UpdateExperimentPayload {
    /// Translate the wire payload into a typed change set. An empty project
    /// string clears the project.
    pub fn into_changes(self) -> ExperimentChanges {
        ExperimentChanges {
            name: self.name,
            project: self.project.map(|p| Some(p).filter(|p| !p.is_empty())),
            tracking_key: self.tracking_key,
            hypothesis: self.hypothesis,
            description: self.description,
            tags: self.tags,
            owner: self.owner,
            exposure_query_id: self.assignment_query_id,
            hash_attribute: self.hash_attribute,
            status: self.status,
            archived: self.archived,
        }
    }
}

/// External representation of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiExperiment {
    pub id: String,
    pub tracking_key: String,
    pub name: String,
    pub project: String,
    pub hypothesis: String,
    pub description: String,
    pub tags: Vec<String>,
    pub owner: String,
    pub datasource_id: String,
    pub assignment_query_id: String,
    pub hash_attribute: String,
    pub status: ExperimentStatus,
    pub archived: bool,
    pub date_created: String,
    pub date_updated: String,
}

impl From<&Experiment> for ApiExperiment {
    fn from(e: &Experiment) -> Self {
        Self {
            id: e.id.clone(),
            tracking_key: e.tracking_key.clone(),
            name: e.name.clone(),
            project: e.project.clone().unwrap_or_default(),
            hypothesis: e.hypothesis.clone(),
            description: e.description.clone(),
            tags: e.tags.clone(),
            owner: e.owner.clone(),
            datasource_id: e.datasource.clone(),
            assignment_query_id: e.exposure_query_id.clone(),
            hash_attribute: e.hash_attribute.clone(),
            status: e.status,
            archived: e.archived,
            date_created: e.date_created.to_rfc3339(),
            date_updated: e.date_updated.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ExperimentResponse {
    pub experiment: ApiExperiment,
}
