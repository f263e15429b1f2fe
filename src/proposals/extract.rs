//! Proposal extraction from recognized text.
//!
//! Patterns are tried longest first; each label is reported once and at most
//! three are returned, in the order they were found.

use super::patterns::{normalize_text, PatternTable};
use super::{PROPOSALS_PER_SEED, UNKNOWN_PROPOSAL};

/// Replaces consumed text so neighbouring characters cannot join into a new match.
const CONSUMED: &str = "\u{1}";

/// Proposals found in one piece of recognized text, in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProposalSet {
    found: Vec<String>,
}

impl ProposalSet {
    pub fn found(&self) -> &[String] {
        &self.found
    }

    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// True when all 3 slots were recognized.
    pub fn is_complete(&self) -> bool {
        self.found.len() == PROPOSALS_PER_SEED
    }

    /// The 3 slots, padding unrecognized ones with `UNKNOWN`.
    pub fn padded(&self) -> [String; PROPOSALS_PER_SEED] {
        std::array::from_fn(|i| {
            self.found
                .get(i)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_PROPOSAL.to_string())
        })
    }
}

/// Maps noisy OCR text to canonical proposal names.
#[derive(Clone, Debug)]
pub struct ProposalExtractor {
    table: PatternTable,
}

impl ProposalExtractor {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }

    /// Extracts up to 3 distinct proposals from `text`.
    ///
    /// Patterns are tried longest-first. A matching pattern consumes every occurrence
    /// of itself, so a short spelling embedded in an already-matched phrase cannot
    /// add a second proposal. Each proposal is reported once, at its first match.
    pub fn extract(&self, text: &str) -> ProposalSet {
        let mut working = normalize_text(text);
        let mut found: Vec<String> = Vec::with_capacity(PROPOSALS_PER_SEED);

        for entry in self.table.entries() {
            if found.len() == PROPOSALS_PER_SEED {
                break;
            }
            if !working.contains(entry.pattern.as_str()) {
                continue;
            }

            working = working.replace(entry.pattern.as_str(), CONSUMED);
            if !found.iter().any(|p| *p == entry.proposal) {
                found.push(entry.proposal.clone());
            }
        }

        ProposalSet { found }
    }

    /// First proposal found in `text`, if any. Used when each slot is captured on its own.
    pub fn extract_one(&self, text: &str) -> Option<String> {
        self.extract(text).found.into_iter().next()
    }
}
