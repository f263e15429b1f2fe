//! Proposal catalog and text-to-proposal extraction.
//!
//! This module provides:
//! - The closed catalog of proposals (name, cost, description, effect)
//! - A pattern table mapping OCR spellings to canonical proposal names
//! - Longest-first extraction of up to 3 proposals from recognized text

pub mod catalog;
pub mod extract;
pub mod patterns;

pub use catalog::{Proposal, ProposalCatalog, ProposalDetails};
pub use extract::{ProposalExtractor, ProposalSet};
pub use patterns::PatternTable;

use thiserror::Error;

/// Placeholder for a slot whose proposal could not be recognized.
pub const UNKNOWN_PROPOSAL: &str = "UNKNOWN";

/// Number of proposals offered per seed.
pub const PROPOSALS_PER_SEED: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog needs at least 3 proposals, got {0}")]
    TooFewProposals(usize),

    #[error("proposal name must not be empty")]
    EmptyName,

    #[error("duplicate proposal: {0}")]
    DuplicateProposal(String),

    #[error("pattern must not be empty (maps to {0})")]
    EmptyPattern(String),

    #[error("pattern {0:?} maps to more than one proposal")]
    ConflictingPattern(String),

    #[error("pattern {pattern:?} maps to unknown proposal {proposal:?}")]
    UnknownProposal { pattern: String, proposal: String },
}
