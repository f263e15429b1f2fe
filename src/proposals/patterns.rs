//! Pattern table: OCR spellings, typos and abbreviations mapped to proposal names.
//!
//! Patterns are kept sorted longest-first (then lexically), which is the order the
//! extractor evaluates them in.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::catalog::ProposalCatalog;
use super::CatalogError;

const BUILTIN_PATTERNS: &str = include_str!("../../resources/patterns.json");

/// Uppercases and collapses whitespace runs to a single space.
///
/// Applied to both patterns and recognized text so that phrases split over
/// several OCR lines still match.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternEntry {
    /// Normalized (uppercase) pattern
    pub pattern: String,
    /// Canonical proposal name
    pub proposal: String,
}

#[derive(Clone, Debug)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// Pattern table bundled with the binary, checked against `catalog`.
    pub fn builtin(catalog: &ProposalCatalog) -> Result<Self> {
        Self::from_json(BUILTIN_PATTERNS, catalog).context("Built-in pattern table is invalid")
    }

    /// Loads a `{ "PATTERN": "Proposal name" }` JSON object from disk.
    pub fn load(path: &Path, catalog: &ProposalCatalog) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read pattern table: {}", path.display()))?;
        Self::from_json(&contents, catalog)
            .context(format!("Invalid pattern table: {}", path.display()))
    }

    pub fn from_json(json: &str, catalog: &ProposalCatalog) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::new(raw, catalog)?)
    }

    pub fn new(
        raw: impl IntoIterator<Item = (String, String)>,
        catalog: &ProposalCatalog,
    ) -> Result<Self, CatalogError> {
        let mut by_pattern: BTreeMap<String, String> = BTreeMap::new();

        for (pattern, proposal) in raw {
            if !catalog.contains(&proposal) {
                return Err(CatalogError::UnknownProposal { pattern, proposal });
            }

            let normalized = normalize_text(&pattern);
            if normalized.is_empty() {
                return Err(CatalogError::EmptyPattern(proposal));
            }

            if let Some(existing) = by_pattern.get(&normalized) {
                if *existing != proposal {
                    return Err(CatalogError::ConflictingPattern(normalized));
                }
                continue;
            }
            by_pattern.insert(normalized, proposal);
        }

        let mut entries: Vec<PatternEntry> = by_pattern
            .into_iter()
            .map(|(pattern, proposal)| PatternEntry { pattern, proposal })
            .collect();

        // Longest first; lexical order breaks ties so evaluation is stable.
        entries.sort_by(|a, b| {
            b.pattern
                .chars()
                .count()
                .cmp(&a.pattern.chars().count())
                .then_with(|| a.pattern.cmp(&b.pattern))
        });

        Ok(Self { entries })
    }

    /// Entries in evaluation order.
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProposalCatalog {
        ProposalCatalog::builtin().unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  scanning\n  exploit\t"), "SCANNING EXPLOIT");
        assert_eq!(normalize_text("Poems  DB"), "POEMS DB");
    }

    #[test]
    fn test_builtin_covers_every_proposal() {
        let catalog = catalog();
        let table = PatternTable::builtin(&catalog).unwrap();
        for name in catalog.names() {
            assert!(
                table.entries().iter().any(|e| e.proposal == name),
                "no pattern for {}",
                name
            );
        }
    }

    #[test]
    fn test_sorted_longest_first_then_lexical() {
        let table = PatternTable::new(
            vec![
                ("padu".to_string(), "PADU".to_string()),
                ("POEMS".to_string(), "Poems DB".to_string()),
                ("LOBBY".to_string(), "Lobby against Tenabolt".to_string()),
                ("POEMS DB".to_string(), "Poems DB".to_string()),
            ],
            &catalog(),
        )
        .unwrap();

        let order: Vec<&str> = table.entries().iter().map(|e| e.pattern.as_str()).collect();
        assert_eq!(order, vec!["POEMS DB", "LOBBY", "POEMS", "PADU"]);
    }

    #[test]
    fn test_rejects_unknown_proposal() {
        let err = PatternTable::new(
            vec![("FOO".to_string(), "Not A Proposal".to_string())],
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownProposal { .. }));
    }

    #[test]
    fn test_rejects_conflicting_spellings() {
        let err = PatternTable::new(
            vec![
                ("padu".to_string(), "PADU".to_string()),
                ("PADU".to_string(), "Poems DB".to_string()),
            ],
            &catalog(),
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::ConflictingPattern("PADU".to_string()));
    }

    #[test]
    fn test_rejects_blank_pattern() {
        let err = PatternTable::new(vec![("   ".to_string(), "PADU".to_string())], &catalog())
            .unwrap_err();
        assert_eq!(err, CatalogError::EmptyPattern("PADU".to_string()));
    }
}
