use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audit::AuditPolicy;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub postgres: PostgresConfig,
    pub audit: AuditConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FLAGDECK_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FLAGDECK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            audit: AuditConfig::from_env_profiled(p),
            metrics: MetricsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{} (cors: {})", self.server.host, self.server.port, self.server.cors_origin);
        tracing::info!("  storage:  backend={}, data_dir={}", self.storage.backend.as_str(), self.storage.data_dir.display());
        if self.storage.backend == StorageBackend::Postgres {
            tracing::info!("  postgres: host={}, db={}", self.postgres.host, self.postgres.database);
        }
        tracing::info!(
            "  audit:    experiment_update={}, metric_create={}, metric_delete={}",
            self.audit.experiment_update, self.audit.metric_create, self.audit.metric_delete
        );
        tracing::info!("  metrics:  include_archived={}", self.metrics.include_archived);
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": {
                "host": self.server.host,
                "port": self.server.port,
                "cors_origin": self.server.cors_origin,
            },
            "storage": {
                "backend": self.storage.backend.as_str(),
                "data_dir": self.storage.data_dir,
                "snapshot_file": self.storage.snapshot_path(),
            },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
            "audit": {
                "experiment_update": self.audit.experiment_update,
                "metric_create": self.audit.metric_create,
                "metric_delete": self.audit.metric_delete,
                "max_entries_per_entity": self.audit.max_entries_per_entity,
            },
            "metrics": { "include_archived": self.metrics.include_archived },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3100),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }

    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "pg" | "postgresql" => StorageBackend::Postgres,
            _ => StorageBackend::Memory,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    /// Snapshot file name relative to `data_dir`; `None` keeps the memory
    /// store purely in-process.
    pub snapshot_file: Option<String>,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: StorageBackend::parse(&profiled_env_or(p, "STORAGE_BACKEND", "memory")),
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
            snapshot_file: Some(profiled_env_or(p, "SNAPSHOT_FILE", "flagdeck.json"))
                .filter(|f| f != "none"),
        }
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_file.as_ref().map(|f| self.data_dir.join(f))
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "flagdeck"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Audit ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub experiment_update: bool,
    pub metric_create: bool,
    pub metric_delete: bool,
    pub max_entries_per_entity: usize,
}

impl AuditConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = AuditPolicy::default();
        Self {
            experiment_update: profiled_env_bool(p, "AUDIT_EXPERIMENT_UPDATE", defaults.experiment_update),
            metric_create: profiled_env_bool(p, "AUDIT_METRIC_CREATE", defaults.metric_create),
            metric_delete: profiled_env_bool(p, "AUDIT_METRIC_DELETE", defaults.metric_delete),
            max_entries_per_entity: profiled_env_u32(p, "AUDIT_MAX_ENTRIES_PER_ENTITY", 500) as usize,
        }
    }

    pub fn policy(&self) -> AuditPolicy {
        AuditPolicy {
            experiment_update: self.experiment_update,
            metric_create: self.metric_create,
            metric_delete: self.metric_delete,
        }
    }
}

// ── Metrics ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metric lookups (get, list, delete) see archived metrics.
    pub include_archived: bool,
}

impl MetricsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            include_archived: profiled_env_bool(p, "METRIC_LOOKUP_INCLUDE_ARCHIVED", false),
        }
    }
}
