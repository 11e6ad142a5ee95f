//! Experiment endpoints: list, get, and the audited update workflow.

mod crud;
mod types;
mod update;


use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub use self::crud::*;
pub use self::types::*;
pub use self::update::update_experiment;

pub fn experiments_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/experiments", get(list_experiments))
        .route(
            "/api/v1/experiments/{id}",
            get(get_experiment).put(put_experiment),
        )
}
