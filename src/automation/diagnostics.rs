//! Diagnostics channel for trials whose proposals were not fully recognized.
//!
//! One JSON object per line, kept outside the raw log directory so it survives
//! `process` clearing the output folder. Entries are meant for manual review.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::observation::format_timestamp;
use crate::observation::Observation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub seed: String,
    /// Proposals that were recognized, in the order found
    pub partial: Vec<String>,
    /// Slots as recorded, including `UNKNOWN` placeholders
    pub recorded: Vec<String>,
    pub raw_text: String,
    pub timestamp: String,
}

impl DiagnosticEntry {
    pub fn from_observation(observation: &Observation, partial: &[String]) -> Self {
        Self {
            seed: observation.seed.to_string(),
            partial: partial.to_vec(),
            recorded: observation.proposals.to_vec(),
            raw_text: observation.raw_text.clone(),
            timestamp: format_timestamp(&observation.timestamp),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    path: PathBuf,
}

impl DiagnosticsLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn append(&self, entry: &DiagnosticEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create diagnostics directory")?;
        }

        let line = serde_json::to_string(entry).context("Failed to serialize diagnostic entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(format!(
                "Failed to open diagnostics log: {}",
                self.path.display()
            ))?;
        writeln!(file, "{}", line).context("Failed to write diagnostic entry")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
