//! Seed identifiers and the resumable seed sequencer.
//!
//! This module provides:
//! - The 5-character base-36 `Seed` type and its index bijection
//! - A sequencer that walks the seed space in systematic or shuffled order
//! - Durable resume state so a relaunch continues past the last emitted seed

pub mod codec;
pub mod sequencer;

pub use codec::{index_lossy, Seed, SeedError, SEED_ALPHABET, SEED_LEN, SEED_SPACE};
pub use sequencer::{SeedSequencer, SequencerConfig, SequencerMode, SequencerState};
