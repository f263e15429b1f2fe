//! Offline processing of harvested observations.
//!
//! This module provides:
//! - Reading the raw observation log (tolerating a truncated last row)
//! - Filtering, deduplication and merging into the master dataset
//! - Statistics over the master dataset
//! - JSON export and the static seed finder page

pub mod csv_reader;
pub mod export;
pub mod frontend;
pub mod master;
pub mod merge;
pub mod statistics;

pub use csv_reader::RawLog;
pub use master::MasterDataset;
pub use merge::{merge, MergeError, MergeReport};
pub use statistics::DatasetStats;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::paths::HarvestPaths;
use crate::proposals::ProposalCatalog;

/// Missing combinations listed in the processing summary.
const MISSING_PREVIEW: usize = 5;

/// What a processing run did.
#[derive(Debug)]
pub struct PipelineSummary {
    pub report: MergeReport,
    pub stats: DatasetStats,
    /// False for dry runs and runs that added nothing
    pub master_written: bool,
    pub backup: Option<PathBuf>,
    pub clean_json: Option<PathBuf>,
    pub archived: Option<PathBuf>,
}

/// Runs the processing pipeline: read raw log, filter, merge, back up, write master,
/// write statistics, update frontend, archive raw log, clear the output directory.
///
/// A dry run stops after the in-memory merge and modifies nothing. Returns `None`
/// when there is no raw log to process.
pub fn run_pipeline(
    paths: &HarvestPaths,
    catalog: &ProposalCatalog,
    dry_run: bool,
    stamp: &str,
) -> Result<Option<PipelineSummary>> {
    let raw_path = paths.raw_log();

    info!("[1/8] Checking for new data...");
    if !raw_path.exists() {
        info!("No raw log at {}. Run the harvester first.", raw_path.display());
        return Ok(None);
    }

    let raw = RawLog::from_csv(&raw_path)?;
    info!(
        "Found {} rows ({} malformed, {} truncated)",
        raw.len(),
        raw.malformed,
        raw.truncated
    );
    if raw.is_empty() && raw.malformed == 0 && raw.truncated == 0 {
        info!("Raw log is empty. Nothing to process.");
        return Ok(None);
    }

    info!("[2/8] Loading master dataset...");
    let existing = MasterDataset::load(&paths.master_file())?;
    info!("Existing seeds: {}", existing.len());

    info!("[3/8] Filtering and merging...");
    let outcome = merge(&existing, &raw, catalog);
    log_report(&outcome.report);

    let stats = DatasetStats::from_master(&outcome.master, catalog);
    log_coverage(&stats);

    if dry_run {
        info!("[DRY RUN] No files will be modified.");
        return Ok(Some(PipelineSummary {
            report: outcome.report,
            stats,
            master_written: false,
            backup: None,
            clean_json: None,
            archived: None,
        }));
    }

    fs::create_dir_all(paths.clean_dir()).context("Failed to create clean data directory")?;

    info!("[4/8] Saving clean JSON...");
    let clean_json = if outcome.clean.is_empty() {
        info!("No valid records in this batch");
        None
    } else {
        let path = export::save_clean_json(&outcome.clean, &paths.clean_dir(), stamp)?;
        info!("Saved: {}", path.display());
        Some(path)
    };

    info!("[5/8] Backing up and writing master dataset...");
    let run = merge::persist_merge(
        outcome,
        catalog,
        &paths.master_file(),
        &paths.clean_dir(),
        stamp,
    )?;
    match &run.backup {
        Some(backup) => info!("Backup: {}", backup.display()),
        None if run.written => info!("No existing master dataset to back up (first run)"),
        None => {}
    }

    info!("[6/8] Writing statistics...");
    export::export_to_json(&stats, &paths.statistics_file())?;

    info!("[7/8] Updating frontend...");
    let update = frontend::update_frontend(&paths.frontend_file(), &run.outcome.master, catalog)?;
    info!("Frontend {:?}: {}", update, paths.frontend_file().display());

    info!("[8/8] Archiving and cleaning...");
    let archived = archive_raw_log(&raw_path, &paths.archive_dir(), stamp)?;
    info!("Archived raw log: {}", archived.display());
    clear_output_dir(&paths.output_dir())?;

    Ok(Some(PipelineSummary {
        report: run.outcome.report,
        stats,
        master_written: run.written,
        backup: run.backup,
        clean_json,
        archived: Some(archived),
    }))
}

/// Loads the master dataset and computes statistics without modifying anything.
pub fn load_stats(paths: &HarvestPaths, catalog: &ProposalCatalog) -> Result<DatasetStats> {
    let master = MasterDataset::load(&paths.master_file())?;
    Ok(DatasetStats::from_master(&master, catalog))
}

/// Rewrites the seed finder page from the template with the current master dataset.
pub fn regenerate_frontend(paths: &HarvestPaths, catalog: &ProposalCatalog) -> Result<usize> {
    let master = MasterDataset::load(&paths.master_file())?;
    frontend::regenerate_frontend(&paths.frontend_file(), &master, catalog)?;
    Ok(master.len())
}

/// Copies the raw log to `archive_dir/seed-log-<stamp>.csv`, never replacing an
/// earlier archive.
pub fn archive_raw_log(raw_path: &Path, archive_dir: &Path, stamp: &str) -> Result<PathBuf> {
    fs::create_dir_all(archive_dir).context("Failed to create archive directory")?;

    let mut dest = archive_dir.join(format!("seed-log-{}.csv", stamp));
    let mut n = 1;
    while dest.exists() {
        dest = archive_dir.join(format!("seed-log-{}-{}.csv", stamp, n));
        n += 1;
    }

    fs::copy(raw_path, &dest).context(format!(
        "Failed to archive {} to {}",
        raw_path.display(),
        dest.display()
    ))?;
    Ok(dest)
}

/// Removes every file in the output directory so the next harvest starts a new log.
pub fn clear_output_dir(output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(output_dir).context("Failed to read output directory")? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path).context(format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

fn log_report(report: &MergeReport) {
    info!("Raw rows:            {}", report.raw_records);
    info!("Removed UNKNOWN:     {}", report.unknown);
    info!("Removed bad seed:    {}", report.invalid_seed);
    info!("Removed bad labels:  {}", report.invalid_labels);
    info!("Malformed rows:      {}", report.malformed);
    info!("Truncated rows:      {}", report.truncated);
    info!("Duplicates in batch: {}", report.duplicates);
    info!("Already in master:   {}", report.already_present);
    info!("New unique seeds:    {}", report.added);
}

fn log_coverage(stats: &DatasetStats) {
    info!(
        "Combinations: {} / {} ({:.4}%)",
        stats.combinations_found, stats.total_combinations, stats.coverage_percent
    );

    let missing = &stats.missing_combinations;
    if missing.is_empty() {
        info!("All combinations found");
        return;
    }

    info!("Still missing {} combinations", missing.len());
    for combo in missing.iter().take(MISSING_PREVIEW) {
        info!("  - {}", combo.join(", "));
    }
    if missing.len() > MISSING_PREVIEW {
        info!("  ... and {} more", missing.len() - MISSING_PREVIEW);
    }
}
