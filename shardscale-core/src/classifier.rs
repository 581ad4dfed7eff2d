//! Shard Classifier
//!
//! Narrows a topology to the shards that still accept writes, and checks that
//! those shards partition the key space.

use std::fmt;

use crate::hash_key::HashKey;
use crate::shard::Shard;

/// Open shards from `shards`.
///
/// With `sort_by_key_range`, the result is ordered by ending hash key using
/// numeric comparison, so neighbours in the result are neighbours in the key
/// space. Otherwise input order is kept.
pub fn filter_open_shards(shards: &[Shard], sort_by_key_range: bool) -> Vec<&Shard> {
    let mut open: Vec<&Shard> = shards.iter().filter(|s| s.is_open()).collect();

    if sort_by_key_range {
        open.sort_by_key(|s| s.hash_key_range.ending_hash_key);
    }

    open
}

/// Why a set of open shards does not tile the key space
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageIssue {
    NoOpenShards,
    DoesNotStartAtZero { first_start: HashKey },
    DoesNotReachMax { last_end: HashKey },
    Gap { after: String, before: String },
    Overlap { first: String, second: String },
}

impl fmt::Display for CoverageIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageIssue::NoOpenShards => write!(f, "no open shards"),
            CoverageIssue::DoesNotStartAtZero { first_start } => {
                write!(f, "lowest open shard starts at {}", first_start)
            }
            CoverageIssue::DoesNotReachMax { last_end } => {
                write!(f, "highest open shard ends at {}", last_end)
            }
            CoverageIssue::Gap { after, before } => {
                write!(f, "keys between {} and {} are unowned", after, before)
            }
            CoverageIssue::Overlap { first, second } => {
                write!(f, "{} and {} overlap", first, second)
            }
        }
    }
}

/// Check that the open shards cover `[0, 2^128)` exactly once
pub fn verify_key_space_coverage(shards: &[Shard]) -> Result<(), CoverageIssue> {
    let mut open = filter_open_shards(shards, false);
    open.sort_by_key(|s| s.hash_key_range.starting_hash_key);

    let (first, last) = match (open.first(), open.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(CoverageIssue::NoOpenShards),
    };

    if first.hash_key_range.starting_hash_key != HashKey::MIN {
        return Err(CoverageIssue::DoesNotStartAtZero {
            first_start: first.hash_key_range.starting_hash_key,
        });
    }

    for pair in open.windows(2) {
        let (low, high) = (&pair[0].hash_key_range, &pair[1].hash_key_range);
        if low.is_adjacent_to(high) {
            continue;
        }
        if high.starting_hash_key <= low.ending_hash_key {
            return Err(CoverageIssue::Overlap {
                first: pair[0].shard_id.clone(),
                second: pair[1].shard_id.clone(),
            });
        }
        return Err(CoverageIssue::Gap {
            after: pair[0].shard_id.clone(),
            before: pair[1].shard_id.clone(),
        });
    }

    if last.hash_key_range.ending_hash_key != HashKey::MAX {
        return Err(CoverageIssue::DoesNotReachMax {
            last_end: last.hash_key_range.ending_hash_key,
        });
    }

    Ok(())
}
