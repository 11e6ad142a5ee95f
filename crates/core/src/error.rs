use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Experiment,
    DataSource,
    Metric,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Experiment => "experiment",
            EntityKind::DataSource => "datasource",
            EntityKind::Metric => "metric",
        };
        f.write_str(name)
    }
}

/// A proposed change that is malformed or conflicts with existing data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unrecognized assignment query ID: {0}")]
    UnknownAssignmentQuery(String),

    #[error("Unknown datasource: {0}")]
    UnknownDataSource(String),

    #[error("Experiment with tracking key already exists: {0}")]
    DuplicateTrackingKey(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

impl ValidationError {
    /// Duplicate natural keys are conflicts; everything else is a bad request.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ValidationError::DuplicateTrackingKey(_))
    }
}

#[derive(Error, Debug)]
pub enum FlagdeckError {
    #[error("Could not find {entity} with id {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("You do not have permission to perform this action")]
    PermissionDenied,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlagdeckError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        FlagdeckError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlagdeckError::NotFound { .. } => ErrorKind::NotFound,
            FlagdeckError::PermissionDenied => ErrorKind::PermissionDenied,
            FlagdeckError::Validation(v) if v.is_conflict() => ErrorKind::Conflict,
            FlagdeckError::Validation(_) => ErrorKind::Validation,
            FlagdeckError::InvalidState(_) => ErrorKind::InvalidState,
            FlagdeckError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Machine-readable error code carried alongside the human message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Validation,
    Conflict,
    InvalidState,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Internal => "internal_error",
        }
    }
}

pub type Result<T, E = FlagdeckError> = std::result::Result<T, E>;
