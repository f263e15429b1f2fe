//! JSON export for statistics and per-run clean batches.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::master::MasterEntry;
use crate::paths::write_atomic;

#[derive(Serialize)]
struct CleanBatch<'a> {
    harvested: &'a str,
    count: usize,
    seeds: &'a [MasterEntry],
}

/// Export a value to a JSON file.
///
/// The output is pretty-printed for human readability.
pub fn export_to_json<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    let mut json =
        serde_json::to_string_pretty(value).context("Failed to serialize value to JSON")?;
    json.push('\n');

    write_atomic(output_path, json.as_bytes())
        .context(format!("Failed to write JSON file: {}", output_path.display()))?;

    Ok(())
}

/// Saves the clean records of one processing run as `clean-seeds-<stamp>.json`.
pub fn save_clean_json(clean: &[MasterEntry], dir: &Path, stamp: &str) -> Result<PathBuf> {
    let path = dir.join(format!("clean-seeds-{}.json", stamp));
    let batch = CleanBatch {
        harvested: stamp,
        count: clean.len(),
        seeds: clean,
    };
    export_to_json(&batch, &path)?;
    Ok(path)
}
