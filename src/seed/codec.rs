//! Base-36 seed codec.
//!
//! A seed is a 5-character string over `0-9A-Z`. Every seed maps to exactly one
//! index in `0..36^5`, most significant character first.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Characters allowed in a seed, in digit order.
pub const SEED_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of characters in a seed.
pub const SEED_LEN: usize = 5;

/// Size of the seed space: 36^5.
pub const SEED_SPACE: u64 = 60_466_176;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("seed must be {SEED_LEN} characters, got {0}")]
    BadLength(usize),

    #[error("invalid seed character {0:?}")]
    BadCharacter(char),

    #[error("seed index {0} is outside 0..{SEED_SPACE}")]
    OutOfRange(u64),
}

/// A well-formed seed. Ordering follows the index order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Encodes an index as a seed, zero-padded to 5 characters.
    pub fn from_index(index: u64) -> Result<Self, SeedError> {
        if index >= SEED_SPACE {
            return Err(SeedError::OutOfRange(index));
        }

        let mut chars = [b'0'; SEED_LEN];
        let mut rest = index;
        for slot in chars.iter_mut().rev() {
            *slot = SEED_ALPHABET[(rest % 36) as usize];
            rest /= 36;
        }

        Ok(Seed(chars))
    }

    /// Strict parse: exactly 5 characters from the seed alphabet.
    pub fn parse(text: &str) -> Result<Self, SeedError> {
        let len = text.chars().count();
        if len != SEED_LEN {
            return Err(SeedError::BadLength(len));
        }

        let mut chars = [b'0'; SEED_LEN];
        for (slot, c) in chars.iter_mut().zip(text.chars()) {
            if digit_value(c).is_none() {
                return Err(SeedError::BadCharacter(c));
            }
            *slot = c as u8;
        }

        Ok(Seed(chars))
    }

    /// Index of this seed in `0..SEED_SPACE`.
    pub fn index(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &c| acc * 36 + digit_value(c as char).unwrap_or(0) as u64)
    }

    pub fn as_str(&self) -> &str {
        // Only alphabet bytes are ever stored, which are ASCII.
        std::str::from_utf8(&self.0).unwrap_or("00000")
    }
}

/// Lossy index conversion for free-form input.
///
/// Characters outside the alphabet count as 0 and only the first 5 characters are
/// read, so this never fails. Lowercase letters are not part of the alphabet.
pub fn index_lossy(text: &str) -> u64 {
    text.chars()
        .take(SEED_LEN)
        .fold(0u64, |acc, c| acc * 36 + digit_value(c).unwrap_or(0) as u64)
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        _ => None,
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({})", self.as_str())
    }
}

impl FromStr for Seed {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Seed::parse(s)
    }
}

impl Serialize for Seed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Seed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Seed::parse(&text).map_err(serde::de::Error::custom)
    }
}
