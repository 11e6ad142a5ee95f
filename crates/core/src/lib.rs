pub mod audit;
pub mod audit_log;
pub mod config;
pub mod context;
pub mod datasource;
pub mod error;
pub mod experiment;
pub mod feature;
pub mod metric;
pub mod permissions;

pub use audit::{AuditEntity, AuditEvent, AuditPolicy, AuditRecorder, AuditedOperation, EventKind};
pub use audit_log::AuditLog;
pub use config::Config;
pub use context::RequestContext;
pub use datasource::*;
pub use error::*;
pub use experiment::*;
pub use feature::*;
pub use metric::*;
pub use permissions::{Permission, PermissionEvaluator, Permissions, Role, RolePolicy};
