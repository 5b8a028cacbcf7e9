use models::RevenueSnapshot;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Year-keyed snapshot files under one data directory, one pretty-printed
/// JSON document per year (`revenue_2024.json`). Reads are forgiving: a
/// missing, unreadable or corrupt file is reported as absent so the caller
/// falls back to a fresh aggregation instead of failing the request.
pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, year: i32) -> PathBuf {
        self.data_dir.join(format!("revenue_{year}.json"))
    }

    pub fn get(&self, year: i32) -> Option<RevenueSnapshot> {
        let path = self.path_for(year);
        if !path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("could not read snapshot {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(
                    "snapshot {} is corrupt and will be rebuilt: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist a snapshot, replacing any previous one for the year. The JSON
    /// goes to a temp file first and is renamed into place, so a crash
    /// mid-write never leaves a truncated snapshot behind.
    pub fn put(&self, year: i32, snapshot: &RevenueSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        let path = self.path_for(year);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!("wrote snapshot {}", path.display());
        Ok(())
    }
}
