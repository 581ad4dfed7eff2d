//! Hash-key arithmetic
//!
//! Partition keys are hashed into the unsigned range `[0, 2^128)`. The control
//! plane exchanges keys as decimal strings; we parse them into `u128` at the
//! boundary so every comparison and midpoint below is exact integer math.
//!
//! Ranges follow the provider convention: both ends are inclusive. A split at
//! key `k` produces `[start, k - 1]` and `[k, end]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ShardScaleError};

/// Size of the whole key space (2^128), exact as an `f64`
pub const KEY_SPACE_SIZE: f64 = 340_282_366_920_938_463_463_374_607_431_768_211_456.0;

/// A single position in the partition key space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashKey(u128);

impl HashKey {
    /// Lowest key in the space
    pub const MIN: HashKey = HashKey(0);
    /// Highest key in the space (2^128 - 1)
    pub const MAX: HashKey = HashKey(u128::MAX);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u128 {
        self.0
    }

    /// `floor((self + other) / 2)` without overflowing `u128`
    pub fn midpoint(self, other: HashKey) -> HashKey {
        let (low, high) = if self <= other {
            (self.0, other.0)
        } else {
            (other.0, self.0)
        };
        HashKey(low + (high - low) / 2)
    }

    /// Key immediately after this one, if any
    pub fn successor(self) -> Option<HashKey> {
        self.0.checked_add(1).map(HashKey)
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HashKey {
    type Err = ShardScaleError;

    fn from_str(s: &str) -> Result<Self> {
        // u128::from_str would accept a leading '+'
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ShardScaleError::MalformedHashKey(s.to_string()));
        }
        s.parse::<u128>()
            .map(HashKey)
            .map_err(|_| ShardScaleError::HashKeyOutOfRange(s.to_string()))
    }
}

impl TryFrom<String> for HashKey {
    type Error = ShardScaleError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<HashKey> for String {
    fn from(key: HashKey) -> Self {
        key.to_string()
    }
}

impl From<u128> for HashKey {
    fn from(value: u128) -> Self {
        HashKey(value)
    }
}

/// Midpoint of two decimal-encoded keys, as a decimal string ready for a split request
///
/// Entry point for callers holding raw wire values. Code that already has
/// parsed ranges uses [`HashKey::midpoint`] directly.
pub fn midpoint_key(start: &str, end: &str) -> Result<String> {
    let start: HashKey = start.parse()?;
    let end: HashKey = end.parse()?;
    Ok(start.midpoint(end).to_string())
}

/// The inclusive key range owned by one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HashKeyRange {
    pub starting_hash_key: HashKey,
    pub ending_hash_key: HashKey,
}

impl HashKeyRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: HashKey, end: HashKey) -> Result<Self> {
        let range = Self {
            starting_hash_key: start,
            ending_hash_key: end,
        };
        range.validate()?;
        Ok(range)
    }

    /// The range covering the whole key space
    pub const fn full() -> Self {
        Self {
            starting_hash_key: HashKey::MIN,
            ending_hash_key: HashKey::MAX,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.starting_hash_key > self.ending_hash_key {
            return Err(ShardScaleError::InvertedRange {
                start: self.starting_hash_key.to_string(),
                end: self.ending_hash_key.to_string(),
            });
        }
        Ok(())
    }

    /// Boundary for splitting this range in two
    pub fn midpoint(&self) -> HashKey {
        self.starting_hash_key.midpoint(self.ending_hash_key)
    }

    /// `end - start`, the numerator of the coverage fraction
    pub fn width(&self) -> u128 {
        self.ending_hash_key
            .value()
            .saturating_sub(self.starting_hash_key.value())
    }

    /// Fraction of the whole key space, `(end - start) / 2^128`
    pub fn coverage(&self) -> f64 {
        self.width() as f64 / KEY_SPACE_SIZE
    }

    /// True when `next` starts exactly one key after this range ends
    pub fn is_adjacent_to(&self, next: &HashKeyRange) -> bool {
        self.ending_hash_key.successor() == Some(next.starting_hash_key)
    }

    /// Union of this range and the range that immediately follows it
    pub fn union(&self, next: &HashKeyRange) -> HashKeyRange {
        HashKeyRange {
            starting_hash_key: self.starting_hash_key,
            ending_hash_key: next.ending_hash_key,
        }
    }
}

impl fmt::Display for HashKeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.starting_hash_key, self.ending_hash_key)
    }
}

/// Format a fraction of the key space the way reports print it, e.g. `"25.00 %"`
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.2} %", fraction * 100.0)
}
