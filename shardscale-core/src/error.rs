//! Error types for shardscale-core
//!
//! Every failure here means the topology we were handed is corrupt.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, ShardScaleError>;

/// Unified error type for the core crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardScaleError {
    // ===== Hash Key Errors =====
    #[error("Malformed hash key: {0:?} is not an unsigned decimal integer")]
    MalformedHashKey(String),

    #[error("Hash key out of range: {0} exceeds 2^128 - 1")]
    HashKeyOutOfRange(String),

    #[error("Inverted hash key range: start {start} is greater than end {end}")]
    InvertedRange { start: String, end: String },
}
