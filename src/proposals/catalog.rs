//! The closed set of proposals a trial can offer.
//!
//! The catalog is configuration, not data: it never grows from observations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use super::CatalogError;

const BUILTIN_CATALOG: &str = include_str!("../../resources/proposals.json");

/// One proposal as it appears in game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub name: String,
    pub description: String,
    /// Purchase cost; policy proposals have none
    pub cost: Option<u32>,
    #[serde(default)]
    pub effect: String,
}

/// Details stored alongside the seeds in the master dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalDetails {
    pub description: String,
    pub cost: Option<u32>,
    pub effect: String,
}

#[derive(Clone, Debug)]
pub struct ProposalCatalog {
    proposals: Vec<Proposal>,
}

impl ProposalCatalog {
    /// Catalog bundled with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("Built-in proposal catalog is invalid")
    }

    /// Loads a catalog from a JSON file (array of proposals).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read proposal catalog: {}", path.display()))?;
        Self::from_json(&contents)
            .context(format!("Invalid proposal catalog: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let proposals: Vec<Proposal> = serde_json::from_str(json)?;
        Ok(Self::new(proposals)?)
    }

    pub fn new(proposals: Vec<Proposal>) -> Result<Self, CatalogError> {
        if proposals.len() < 3 {
            return Err(CatalogError::TooFewProposals(proposals.len()));
        }

        let mut seen = HashSet::new();
        for p in &proposals {
            if p.name.trim().is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if !seen.insert(p.name.as_str()) {
                return Err(CatalogError::DuplicateProposal(p.name.clone()));
            }
        }

        Ok(Self { proposals })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.proposals.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.name == name)
    }

    /// Proposal names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.proposals.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Number of unordered 3-proposal combinations: C(n, 3).
    pub fn total_combinations(&self) -> usize {
        let n = self.proposals.len();
        n * (n - 1) * (n - 2) / 6
    }

    /// Name-keyed details for embedding in the master dataset.
    pub fn details(&self) -> BTreeMap<String, ProposalDetails> {
        self.proposals
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    ProposalDetails {
                        description: p.description.clone(),
                        cost: p.cost,
                        effect: p.effect.clone(),
                    },
                )
            })
            .collect()
    }
}
