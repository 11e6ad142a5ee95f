//! Shared API plumbing: error responses, request context extraction, and
//! pagination.

pub mod doc;
mod health;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use flagdeck_core::{ErrorKind, FlagdeckError, Permissions, RequestContext, Role};

pub use health::health;

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// An error on its way out as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: ErrorKind::Validation.as_str(),
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidState | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FlagdeckError> for ApiError {
    fn from(e: FlagdeckError) -> Self {
        let kind = e.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!(code = kind.as_str(), "{}", e);
        }
        Self {
            status,
            code: kind.as_str(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ── Request context ──────────────────────────────────────────────

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const PROJECT_ROLES_HEADER: &str = "x-project-roles";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build the request context from the headers set by the upstream auth
/// layer. Organization and user are required; the role defaults to
/// `readonly`; project roles are `project:role` pairs separated by commas.
pub fn context_from_headers(headers: &HeaderMap) -> ApiResult<RequestContext> {
    let organization = header(headers, ORGANIZATION_HEADER)
        .ok_or_else(|| ApiError::unauthorized(format!("missing {} header", ORGANIZATION_HEADER)))?;
    let user = header(headers, USER_HEADER)
        .ok_or_else(|| ApiError::unauthorized(format!("missing {} header", USER_HEADER)))?;

    let role = match header(headers, ROLE_HEADER) {
        Some(raw) => raw.parse::<Role>().map_err(ApiError::bad_request)?,
        None => Role::ReadOnly,
    };
    let mut permissions = Permissions::new(role);

    if let Some(raw) = header(headers, PROJECT_ROLES_HEADER) {
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (project, role) = pair
                .split_once(':')
                .ok_or_else(|| ApiError::bad_request(format!("malformed project role '{}'", pair)))?;
            let role = role.parse::<Role>().map_err(ApiError::bad_request)?;
            permissions = permissions.with_project_role(project.trim(), role);
        }
    }

    Ok(RequestContext::new(user, organization, permissions))
}

/// Extractor wrapper so handlers can take the context as an argument.
pub struct Ctx(pub RequestContext);

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context_from_headers(&parts.headers).map(Ctx)
    }
}

// ── Pagination ───────────────────────────────────────────────────

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size (default 10, max 100).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub project_id: Option<String>,
    pub datasource_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub limit: usize,
    pub offset: usize,
    pub count: usize,
    pub total: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

/// Cut one page out of an already ordered list.
pub fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: Option<usize>) -> (Vec<T>, PageInfo) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = offset.unwrap_or(0);
    let total = items.len();
    let page: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    let count = page.len();
    let has_more = offset + count < total;
    let info = PageInfo {
        limit,
        offset,
        count,
        total,
        has_more,
        next_offset: has_more.then_some(offset + count),
    };
    (page, info)
}
