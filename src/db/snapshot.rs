use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::db::models::{ChatMessage, DailyUsage, Transaction, UserRecord};
use crate::error::StoreError;

/// Everything that survives a restart. Sessions, pending verification
/// codes and rate-limit counters are rebuilt from scratch and do not
/// appear here.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: HashMap<Uuid, UserRecord>,
    pub transactions: Vec<Transaction>,
    pub messages: HashMap<Uuid, VecDeque<ChatMessage>>,
    pub daily_usage: HashMap<Uuid, DailyUsage>,
}

/// Load the snapshot at `path`. A missing file is a fresh install and an
/// unreadable one is logged and discarded; both yield an empty snapshot.
pub fn load(path: &Path) -> Snapshot {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Snapshot::default();
        }
        Err(err) => {
            warn!("Failed to read snapshot {}: {}", path.display(), err);
            return Snapshot::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(
                "Discarding corrupt snapshot {}: {}",
                path.display(),
                err
            );
            Snapshot::default()
        }
    }
}

/// Write the snapshot to a sibling temp file and rename it into place so
/// a crash mid-write never leaves a truncated file behind.
pub fn write(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Persist(e.to_string()))?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|e| StoreError::Persist(e.to_string()))?;
    serde_json::to_writer_pretty(file, snapshot)?;
    fs::rename(&tmp_path, path)
        .map_err(|e| StoreError::Persist(e.to_string()))?;

    Ok(())
}
