//! The master dataset: at most one observation per seed, persisted as JSON.
//!
//! The file holds no wall-clock fields and seeds are written in index order, so the
//! same content always serializes to the same bytes. Writes go to a temporary file
//! in the target directory which is then renamed over the old file.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::proposals::{ProposalCatalog, ProposalDetails, PROPOSALS_PER_SEED};
use crate::seed::Seed;

/// Current master file layout version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterEntry {
    pub seed: Seed,
    /// Proposals in slot order
    pub proposals: [String; PROPOSALS_PER_SEED],
    /// When the seed was first harvested, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MasterFile {
    #[serde(default)]
    format_version: u32,
    #[serde(default)]
    total_seeds: usize,
    #[serde(default)]
    proposals: BTreeMap<String, ProposalDetails>,
    seeds: Vec<MasterEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterDataset {
    entries: BTreeMap<Seed, MasterEntry>,
}

impl MasterDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the master dataset. A missing file is an empty dataset; an unreadable
    /// or corrupt one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let contents = fs::read_to_string(path)
            .context(format!("Failed to read master dataset: {}", path.display()))?;
        let file: MasterFile = serde_json::from_str(&contents)
            .context(format!("Failed to parse master dataset: {}", path.display()))?;

        let mut dataset = Self::new();
        for entry in file.seeds {
            // First entry wins if a hand-edited file repeats a seed.
            dataset.entries.entry(entry.seed).or_insert(entry);
        }
        Ok(dataset)
    }

    pub fn contains(&self, seed: &Seed) -> bool {
        self.entries.contains_key(seed)
    }

    pub fn get(&self, seed: &Seed) -> Option<&MasterEntry> {
        self.entries.get(seed)
    }

    /// Inserts an entry unless the seed is already present. Returns true if inserted.
    pub fn insert_new(&mut self, entry: MasterEntry) -> bool {
        if self.entries.contains_key(&entry.seed) {
            return false;
        }
        self.entries.insert(entry.seed, entry);
        true
    }

    /// Entries in seed order.
    pub fn entries(&self) -> impl Iterator<Item = &MasterEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON with the catalog details embedded for reference.
    pub fn to_json(&self, catalog: &ProposalCatalog) -> Result<String, serde_json::Error> {
        let file = MasterFile {
            format_version: FORMAT_VERSION,
            total_seeds: self.entries.len(),
            proposals: catalog.details(),
            seeds: self.entries.values().cloned().collect(),
        };
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');
        Ok(json)
    }
}

/// Copies the current master file into `backup_dir` before it is overwritten.
///
/// Returns `Ok(None)` when there is no master file yet. Never overwrites an earlier
/// backup: if the timestamped name is taken, a numeric suffix is added.
pub fn backup_master(master_path: &Path, backup_dir: &Path, stamp: &str) -> io::Result<Option<PathBuf>> {
    if !master_path.exists() {
        return Ok(None);
    }

    fs::create_dir_all(backup_dir)?;
    let mut source = fs::File::open(master_path)?;

    for attempt in 0u32.. {
        let name = if attempt == 0 {
            format!("merged-seeds-backup-{}.json", stamp)
        } else {
            format!("merged-seeds-backup-{}-{}.json", stamp, attempt)
        };
        let dest = backup_dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(mut file) => {
                io::copy(&mut source, &mut file)?;
                file.sync_all()?;
                return Ok(Some(dest));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::other("no free backup file name"))
}
