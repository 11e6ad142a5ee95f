//! Metric endpoints and workflows: list, get, create, delete.

mod crud;
mod service;
mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub use self::crud::*;
pub use self::service::{create_metric, delete_metric, get_metric, list_metrics};
pub use self::types::*;

pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/metrics", get(list_metrics_handler).post(post_metric))
        .route(
            "/api/v1/metrics/{id}",
            get(get_metric_handler).delete(delete_metric_handler),
        )
}
