//! HTTP surface for flagdeck: experiment updates, metric CRUD, and audit
//! history, served by axum.

pub mod api;
pub mod audit;
pub mod cli;
pub mod experiments;
pub mod metrics;
pub mod router;
pub mod startup;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use router::build_router;
pub use state::AppState;
