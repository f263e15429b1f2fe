//! Harvester configuration.
//!
//! Loads settings from config.json in the base directory. Every section has
//! defaults, so a partial file only overrides what it names. A missing or
//! unreadable file falls back to defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::automation::AutomationConfig;
use crate::ocr::OcrConfig;
use crate::proposals::{PatternTable, ProposalCatalog};
use crate::seed::SequencerConfig;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub sequencer: SequencerConfig,
    pub automation: AutomationConfig,
    pub ocr: OcrConfig,
    /// Proposal catalog file; the built-in catalog when unset
    pub catalog_path: Option<PathBuf>,
    /// Pattern table file; the built-in table when unset
    pub patterns_path: Option<PathBuf>,
}

impl HarvesterConfig {
    /// Loads configuration from `path` or returns defaults.
    pub fn load(path: &Path) -> Self {
        info!("Looking for config at: {}", path.display());

        if !path.exists() {
            info!("{} not found. Using default config.", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Relative catalog and pattern paths are resolved against `base`.
    pub fn load_catalog(&self, base: &Path) -> Result<ProposalCatalog> {
        match &self.catalog_path {
            Some(path) => ProposalCatalog::load(&base.join(path)),
            None => ProposalCatalog::builtin(),
        }
    }

    pub fn load_patterns(&self, base: &Path, catalog: &ProposalCatalog) -> Result<PatternTable> {
        match &self.patterns_path {
            Some(path) => PatternTable::load(&base.join(path), catalog),
            None => PatternTable::builtin(catalog),
        }
    }
}
