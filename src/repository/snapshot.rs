use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use crate::domain::{Competition, ReadingEvent, User};
use crate::ranking::RankingEntry;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Whole persisted state: repositories plus ranking-store contents keyed by
/// leaderboard key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub competitions: Vec<Competition>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub readings: Vec<ReadingEvent>,
    #[serde(default)]
    pub leaderboards: BTreeMap<String, Vec<RankingEntry>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            competitions: Vec::new(),
            users: Vec::new(),
            readings: Vec::new(),
            leaderboards: BTreeMap::new(),
        }
    }
}

/// Load a snapshot from a JSON file.
///
/// A missing file yields an empty snapshot. An unsupported version is an error.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Ok(Snapshot::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open state file at {}", path.display()))?;

    let snapshot: Snapshot =
        serde_json::from_reader(file).context("Failed to load state snapshot")?;

    if snapshot.version != SNAPSHOT_VERSION {
        anyhow::bail!("Unsupported state snapshot version: {}", snapshot.version);
    }

    Ok(snapshot)
}

/// Save a snapshot atomically, creating the parent directory if needed.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory at {}", parent.display())
            })?;
        }
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, snapshot)
        .context("Failed to serialize state snapshot")?;

    file.commit().context("Failed to save state snapshot")?;

    Ok(())
}
