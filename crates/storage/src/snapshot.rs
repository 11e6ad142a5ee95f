//! JSON snapshot of the entity tables, used to persist the memory backend
//! and to seed a fresh deployment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use flagdeck_core::{DataSource, Experiment, Metric};

use crate::error::StorageError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub experiments: Vec<Experiment>,
    #[serde(default)]
    pub datasources: Vec<DataSource>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl Snapshot {
    /// Read a snapshot. A missing file yields an empty snapshot.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            warn!("Snapshot {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&data)?;
        info!(
            experiments = snapshot.experiments.len(),
            datasources = snapshot.datasources.len(),
            metrics = snapshot.metrics.len(),
            "Loaded snapshot from {}",
            path.display()
        );
        Ok(snapshot)
    }

    /// Write atomically: serialize to a sibling temp file, then rename.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.datasources.is_empty() && self.metrics.is_empty()
    }
}
