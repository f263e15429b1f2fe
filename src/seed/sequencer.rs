//! Resumable seed sequencer.
//!
//! Emits seeds one at a time, either in index order (systematic) or in a keyed
//! shuffled order (random). Every emitted seed is written to the resume file before
//! it is returned, so a crash after emission resumes past it instead of repeating
//! work already logged.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::codec::{Seed, SEED_SPACE};
use crate::paths::write_atomic;

/// Order in which the seed space is walked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerMode {
    /// Keyed permutation of the whole space. Reproducible for a given key.
    Random,
    /// 00000, 00001, 00002, ...
    Systematic,
}

/// Sequencer settings from config.json.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub mode: SequencerMode,
    /// Position to start from when there is no usable resume file
    pub start_index: u64,
    /// Key for the random-mode permutation
    pub shuffle_key: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            mode: SequencerMode::Random,
            start_index: 0,
            shuffle_key: 0x5EED_0F_7A1,
        }
    }
}

/// Snapshot of where the sequencer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SequencerState {
    pub mode: SequencerMode,
    /// Position of the next seed to be emitted (equals the seed index in systematic mode)
    pub next_index: u64,
}

/// Affine permutation `p -> (a*p + b) mod 36^5` with `a` coprime to 36.
#[derive(Clone, Copy, Debug)]
struct Permutation {
    multiplier: u64,
    offset: u64,
    inverse: u64,
}

impl Permutation {
    fn from_key(key: u64) -> Self {
        let mixed = splitmix64(key);
        let mut multiplier = mixed % SEED_SPACE;
        // 36^5 = 2^10 * 3^10, so the multiplier must be odd and not divisible by 3.
        if multiplier % 2 == 0 {
            multiplier += 1;
        }
        while multiplier % 3 == 0 {
            multiplier += 2;
        }
        if multiplier >= SEED_SPACE {
            multiplier -= SEED_SPACE;
        }
        let offset = splitmix64(mixed) % SEED_SPACE;
        let inverse = mod_inverse(multiplier, SEED_SPACE);

        Self {
            multiplier,
            offset,
            inverse,
        }
    }

    fn apply(&self, position: u64) -> u64 {
        ((self.multiplier as u128 * position as u128 + self.offset as u128) % SEED_SPACE as u128)
            as u64
    }

    fn invert(&self, index: u64) -> u64 {
        let shifted = (index + SEED_SPACE - self.offset) % SEED_SPACE;
        ((self.inverse as u128 * shifted as u128) % SEED_SPACE as u128) as u64
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Modular inverse by extended Euclid. `value` must be coprime to `modulus`.
fn mod_inverse(value: u64, modulus: u64) -> u64 {
    let (mut old_r, mut r) = (value as i128, modulus as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    old_s.rem_euclid(modulus as i128) as u64
}

/// Walks the seed space and persists the last emitted seed.
pub struct SeedSequencer {
    mode: SequencerMode,
    permutation: Permutation,
    next_position: u64,
    resume_path: PathBuf,
}

impl SeedSequencer {
    /// Opens a sequencer, resuming from `resume_path` when it holds a well-formed seed.
    ///
    /// A missing or malformed resume file falls back to `config.start_index`.
    pub fn open(config: &SequencerConfig, resume_path: &Path) -> Self {
        let permutation = Permutation::from_key(config.shuffle_key);
        let mut sequencer = Self {
            mode: config.mode,
            permutation,
            next_position: config.start_index,
            resume_path: resume_path.to_path_buf(),
        };

        match fs::read_to_string(resume_path) {
            Ok(contents) => match Seed::parse(contents.trim()) {
                Ok(last) => {
                    sequencer.next_position = sequencer.position_of(last) + 1;
                    info!(
                        "Resuming after seed {} (next position {})",
                        last, sequencer.next_position
                    );
                }
                Err(e) => {
                    warn!(
                        "Ignoring malformed resume file {} ({}), starting at {}",
                        resume_path.display(),
                        e,
                        config.start_index
                    );
                }
            },
            Err(_) => {
                info!(
                    "No resume file at {}, starting at {}",
                    resume_path.display(),
                    config.start_index
                );
            }
        }

        sequencer
    }

    /// Emits the next seed, or `None` once the whole space has been walked.
    ///
    /// The seed is persisted as the new resume point before it is returned.
    pub fn next_seed(&mut self) -> Result<Option<Seed>> {
        if self.next_position >= SEED_SPACE {
            return Ok(None);
        }

        let seed = Seed::from_index(self.index_at(self.next_position))?;
        write_atomic(&self.resume_path, seed.as_str().as_bytes()).context(format!(
            "Failed to write resume file: {}",
            self.resume_path.display()
        ))?;
        self.next_position += 1;

        debug!("Emitted seed {}", seed);
        Ok(Some(seed))
    }

    pub fn state(&self) -> SequencerState {
        SequencerState {
            mode: self.mode,
            next_index: self.next_position,
        }
    }

    fn index_at(&self, position: u64) -> u64 {
        match self.mode {
            SequencerMode::Systematic => position,
            SequencerMode::Random => self.permutation.apply(position),
        }
    }

    fn position_of(&self, seed: Seed) -> u64 {
        match self.mode {
            SequencerMode::Systematic => seed.index(),
            SequencerMode::Random => self.permutation.invert(seed.index()),
        }
    }
}
