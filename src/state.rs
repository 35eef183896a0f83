// src/state.rs
//
// Durable load/save of all dedup records. The format is a plain JSON map
// source id -> record; the store only cares that it round-trips faithfully.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use crate::dedup::DedupRecord;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load every source's record. A missing state file is a cold start and
    /// yields an empty map, not an error.
    async fn load_all(&self) -> Result<HashMap<String, DedupRecord>>;
    /// Persist every source's record.
    async fn save_all(&self, records: &HashMap<String, DedupRecord>) -> Result<()>;
}

/// JSON file-backed state store. Writes go through a temp file in the same
/// directory followed by a rename, so a crash mid-save leaves the previous
/// state intact.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the state directory and probe it with a throwaway write.
    /// Failure here means `load_all`/`save_all` can never work; callers
    /// should treat it as a startup error.
    pub async fn ensure_writable(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating state directory {}", parent.display()))?;
            }
        }
        let probe = self.tmp_path(".probe");
        fs::write(&probe, b"ok")
            .await
            .with_context(|| format!("state directory not writable: {}", probe.display()))?;
        let _ = fs::remove_file(&probe).await;
        Ok(())
    }

    fn tmp_path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        name.push_str(suffix);
        name.insert(0, '.');
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load_all(&self) -> Result<HashMap<String, DedupRecord>> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading state from {}", self.path.display()));
            }
        };
        serde_json::from_str(&data)
            .with_context(|| format!("parsing state file {}", self.path.display()))
    }

    async fn save_all(&self, records: &HashMap<String, DedupRecord>) -> Result<()> {
        let data = serde_json::to_vec_pretty(records).context("serializing dedup state")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating state directory {}", parent.display()))?;
            }
        }
        let tmp = self.tmp_path(".tmp");
        fs::write(&tmp, &data)
            .await
            .with_context(|| format!("writing temp state file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming state file into {}", self.path.display()))?;
        Ok(())
    }
}
