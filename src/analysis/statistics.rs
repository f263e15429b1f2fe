//! Statistics derived from the master dataset.
//!
//! Everything here is a pure function of the dataset and the catalog, recomputed in
//! full each time. Output order is fixed (catalog order for proposals and pairs,
//! lexical order for combinations) so repeated runs give identical JSON.

use serde::Serialize;
use std::collections::BTreeMap;

use super::master::MasterDataset;
use crate::proposals::{ProposalCatalog, PROPOSALS_PER_SEED};

/// An unordered proposal triple, stored with names in lexical order.
pub type Combination = [String; PROPOSALS_PER_SEED];

/// Appearance statistics for one proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalStats {
    pub name: String,
    /// Seeds offering this proposal
    pub count: usize,
    /// Fraction of seeds offering this proposal
    pub rate: f64,
    /// How often the proposal appeared in slot 1, 2 and 3
    pub slots: [usize; PROPOSALS_PER_SEED],
}

/// How often two proposals were offered together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairStats {
    pub first: String,
    pub second: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_seeds: usize,
    pub total_combinations: usize,
    pub combinations_found: usize,
    /// combinations_found / total_combinations
    pub coverage: f64,
    pub coverage_percent: f64,
    pub proposals: Vec<ProposalStats>,
    /// Every catalog pair, including pairs never seen together
    pub pairs: Vec<PairStats>,
    /// Combinations observed on exactly one seed
    pub unique_combinations: Vec<Combination>,
    /// Combinations not observed yet
    pub missing_combinations: Vec<Combination>,
}

impl DatasetStats {
    pub fn from_master(master: &MasterDataset, catalog: &ProposalCatalog) -> Self {
        let names: Vec<&str> = catalog.names().collect();
        let total_seeds = master.len();

        let mut appearances: BTreeMap<&str, (usize, [usize; PROPOSALS_PER_SEED])> =
            names.iter().map(|&n| (n, (0, [0; PROPOSALS_PER_SEED]))).collect();
        let mut pair_counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        let mut combo_counts: BTreeMap<Combination, usize> = BTreeMap::new();

        for entry in master.entries() {
            for (slot, name) in entry.proposals.iter().enumerate() {
                if let Some((count, slots)) = appearances.get_mut(name.as_str()) {
                    *count += 1;
                    slots[slot] += 1;
                }
            }

            for i in 0..PROPOSALS_PER_SEED {
                for j in (i + 1)..PROPOSALS_PER_SEED {
                    let a = entry.proposals[i].as_str();
                    let b = entry.proposals[j].as_str();
                    let key = if a <= b { (a, b) } else { (b, a) };
                    *pair_counts.entry(key).or_insert(0) += 1;
                }
            }

            *combo_counts.entry(combination_key(&entry.proposals)).or_insert(0) += 1;
        }

        let proposals = names
            .iter()
            .map(|&name| {
                let (count, slots) = appearances.get(name).copied().unwrap_or_default();
                ProposalStats {
                    name: name.to_string(),
                    count,
                    rate: ratio(count, total_seeds),
                    slots,
                }
            })
            .collect();

        let mut pairs = Vec::new();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                let (a, b) = (names[i], names[j]);
                let key = if a <= b { (a, b) } else { (b, a) };
                pairs.push(PairStats {
                    first: a.to_string(),
                    second: b.to_string(),
                    count: pair_counts.get(&key).copied().unwrap_or(0),
                });
            }
        }

        let all = all_combinations(&names);
        let total_combinations = all.len();
        let (found, missing): (Vec<Combination>, Vec<Combination>) =
            all.into_iter().partition(|c| combo_counts.contains_key(c));
        let combinations_found = found.len();

        let unique_combinations = combo_counts
            .iter()
            .filter(|(_, count)| **count == 1)
            .map(|(combo, _)| combo.clone())
            .collect();

        let coverage = ratio(combinations_found, total_combinations);

        DatasetStats {
            total_seeds,
            total_combinations,
            combinations_found,
            coverage,
            coverage_percent: coverage * 100.0,
            proposals,
            pairs,
            unique_combinations,
            missing_combinations: missing,
        }
    }
}

/// Order-independent key for a proposal triple.
pub fn combination_key(proposals: &[String; PROPOSALS_PER_SEED]) -> Combination {
    let mut key = proposals.clone();
    key.sort();
    key
}

/// All unordered triples of `names`, each sorted, in lexical order.
fn all_combinations(names: &[&str]) -> Vec<Combination> {
    let mut sorted: Vec<&str> = names.to_vec();
    sorted.sort();

    let mut combos = Vec::new();
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            for k in (j + 1)..sorted.len() {
                combos.push([
                    sorted[i].to_string(),
                    sorted[j].to_string(),
                    sorted[k].to_string(),
                ]);
            }
        }
    }
    combos
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
