//! Configuration for the content-sync engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::envelope::ContentType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Origin serving the change feed and the per-type data endpoints.
    pub base_url: String,

    /// Path of the change-feed endpoint on `base_url`.
    pub change_feed_path: String,

    /// Detection period in milliseconds.
    pub poll_interval_ms: u64,

    /// Well-known slot file shared by every process of the deployment.
    pub relay_slot: PathBuf,

    /// Extra content-type -> endpoint-path entries, merged over the stock
    /// table (configured entries win).
    pub endpoints: HashMap<String, String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            change_feed_path: "/api/content-updates".to_string(),
            poll_interval_ms: 30_000,
            relay_slot: std::env::temp_dir()
                .join("contentsync")
                .join("content-update.json"),
            endpoints: HashMap::new(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a JSON file. Missing fields fall back to the
    /// defaults.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config: {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn change_feed_url(&self) -> String {
        format!("{}{}", self.base_url, self.change_feed_path)
    }

    pub(crate) fn endpoint_table(&self) -> HashMap<ContentType, String> {
        self.endpoints
            .iter()
            .map(|(ct, path)| (ContentType::from(ct.as_str()), path.clone()))
            .collect()
    }
}
