//! Layered error types for the core (§7), mirroring the daemon's
//! `PlatformError`/`SerializationError`/... → `DaemonError` composition
//! pattern, but scoped to what the core itself can fail at: the engine
//! never aborts the process, so every fallible entry point returns one of
//! these instead of panicking.

use alloc::string::String;
use thiserror::Error;

/// Errors the core can surface while building or validating a stage from a
/// parsed rule set, or while compiling ancillary data (device filters).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    #[error("device filter is not a valid pattern: {0}")]
    InvalidDeviceFilter(String),

    #[error("context {context_index} references output index {output_index} with no matching output")]
    DanglingOutputIndex { context_index: usize, output_index: i32 },

    #[error("input expression in context {context_index} is malformed: `Not` has no preceding key reference")]
    MalformedNotExpression { context_index: usize },

    #[error("stage index {0} is out of range")]
    StageIndexOutOfRange(usize),

    #[error("virtual key toggle depth exceeded while applying output")]
    ToggleDepthExceeded,
}
