//! Merging raw observations into the master dataset.
//!
//! A merge run moves through: Idle → Filtering → Deduplicating → BackingUp → Writing → Idle.
//! If nothing new survives filtering and deduplication the run returns to Idle without
//! touching the master file. A failed backup stops the run before the master is written.

use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::csv_reader::{RawLog, RawRecord};
use super::master::{backup_master, MasterDataset, MasterEntry};
use crate::observation::has_distinct;
use crate::paths::write_atomic;
use crate::proposals::{ProposalCatalog, UNKNOWN_PROPOSAL};
use crate::seed::Seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePhase {
    Idle,
    Filtering,
    Deduplicating,
    BackingUp,
    Writing,
    Failed,
}

impl std::fmt::Display for MergePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePhase::Idle => write!(f, "Idle"),
            MergePhase::Filtering => write!(f, "Filtering"),
            MergePhase::Deduplicating => write!(f, "Deduplicating"),
            MergePhase::BackingUp => write!(f, "Backing up"),
            MergePhase::Writing => write!(f, "Writing"),
            MergePhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("backup of {master} failed, master dataset left unchanged")]
    BackupFailed {
        master: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write master dataset {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize master dataset")]
    Serialize(#[from] serde_json::Error),
}

/// Counts for every record that entered the merge. Nothing is dropped uncounted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Rows read successfully from the raw logs
    pub raw_records: usize,
    /// Rows that could not be parsed
    pub malformed: usize,
    /// Incomplete final rows from an interrupted write
    pub truncated: usize,
    /// Rows with an `UNKNOWN` slot
    pub unknown: usize,
    /// Rows whose seed is not 5 alphabet characters
    pub invalid_seed: usize,
    /// Rows without 3 distinct catalog proposals
    pub invalid_labels: usize,
    /// Repeats of a seed earlier in the same batch
    pub duplicates: usize,
    /// Seeds the master dataset already holds
    pub already_present: usize,
    /// New seeds added to the master dataset
    pub added: usize,
}

impl MergeReport {
    /// Records excluded for any reason.
    pub fn excluded(&self) -> usize {
        self.malformed
            + self.truncated
            + self.unknown
            + self.invalid_seed
            + self.invalid_labels
            + self.duplicates
            + self.already_present
    }
}

/// Result of the in-memory merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub master: MasterDataset,
    /// Valid records of this batch after in-batch deduplication
    pub clean: Vec<MasterEntry>,
    pub report: MergeReport,
}

/// Result of a persisted merge run.
#[derive(Debug)]
pub struct MergeRun {
    pub outcome: MergeOutcome,
    /// Backup of the previous master, if one existed and the master was rewritten
    pub backup: Option<PathBuf>,
    /// False when the run had nothing new and left the master file alone
    pub written: bool,
}

/// Merges a batch of raw records into `existing`.
///
/// Pure: neither input is modified and no file is touched. The first occurrence of a
/// seed wins, both within the batch and against `existing`.
pub fn merge(existing: &MasterDataset, raw: &RawLog, catalog: &ProposalCatalog) -> MergeOutcome {
    let mut report = MergeReport {
        raw_records: raw.records.len(),
        malformed: raw.malformed,
        truncated: raw.truncated,
        ..MergeReport::default()
    };

    debug!("Merge phase: {}", MergePhase::Filtering);
    let valid: Vec<MasterEntry> = raw
        .records
        .iter()
        .filter_map(|record| validate(record, catalog, &mut report))
        .collect();

    debug!("Merge phase: {}", MergePhase::Deduplicating);
    let mut master = existing.clone();
    let mut seen: HashSet<Seed> = HashSet::new();
    let mut clean = Vec::with_capacity(valid.len());

    for entry in valid {
        if !seen.insert(entry.seed) {
            report.duplicates += 1;
            continue;
        }
        clean.push(entry.clone());

        if master.insert_new(entry) {
            report.added += 1;
        } else {
            report.already_present += 1;
        }
    }

    MergeOutcome {
        master,
        clean,
        report,
    }
}

fn validate(
    record: &RawRecord,
    catalog: &ProposalCatalog,
    report: &mut MergeReport,
) -> Option<MasterEntry> {
    if record.proposals.iter().any(|p| p == UNKNOWN_PROPOSAL) {
        report.unknown += 1;
        return None;
    }

    let seed = match Seed::parse(&record.seed) {
        Ok(seed) => seed,
        Err(e) => {
            debug!("Row {}: invalid seed {:?}: {}", record.line, record.seed, e);
            report.invalid_seed += 1;
            return None;
        }
    };

    if !record.proposals.iter().all(|p| catalog.contains(p)) || !has_distinct(&record.proposals) {
        debug!("Row {}: invalid proposals {:?}", record.line, record.proposals);
        report.invalid_labels += 1;
        return None;
    }

    Some(MasterEntry {
        seed,
        proposals: record.proposals.clone(),
        first_seen: record.timestamp,
    })
}

/// Persists an in-memory merge: backup first, then an atomic write of the master.
///
/// The existing master is copied to `backup_dir` before it is replaced. If the
/// backup fails the master file is not touched and `MergeError::BackupFailed` is
/// returned.
pub fn persist_merge(
    outcome: MergeOutcome,
    catalog: &ProposalCatalog,
    master_path: &Path,
    backup_dir: &Path,
    stamp: &str,
) -> Result<MergeRun, MergeError> {
    if outcome.report.added == 0 {
        info!(
            "Merge phase: {} (no new seeds, master dataset unchanged)",
            MergePhase::Idle
        );
        return Ok(MergeRun {
            outcome,
            backup: None,
            written: false,
        });
    }

    let json = outcome.master.to_json(catalog)?;

    info!("Merge phase: {}", MergePhase::BackingUp);
    let backup = match backup_master(master_path, backup_dir, stamp) {
        Ok(backup) => backup,
        Err(source) => {
            warn!("Merge phase: {} (backup failed: {})", MergePhase::Failed, source);
            return Err(MergeError::BackupFailed {
                master: master_path.to_path_buf(),
                source,
            });
        }
    };

    info!("Merge phase: {}", MergePhase::Writing);
    if let Err(source) = write_atomic(master_path, json.as_bytes()) {
        warn!("Merge phase: {} (write failed: {})", MergePhase::Failed, source);
        return Err(MergeError::WriteFailed {
            path: master_path.to_path_buf(),
            source,
        });
    }

    info!(
        "Merge phase: {} ({} new seeds, {} total)",
        MergePhase::Idle,
        outcome.report.added,
        outcome.master.len()
    );

    Ok(MergeRun {
        outcome,
        backup,
        written: true,
    })
}
