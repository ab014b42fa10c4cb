//! Domain layer: the parts of the engine that exist independent of any OS
//! backend — the compiled rule set as an aggregate, the events it produces,
//! and the repository boundary a host crate implements to supply one.

pub mod aggregates;
pub mod events;
pub mod repositories;
pub mod services;

pub use aggregates::RuleSetAggregate;
pub use events::{DomainEvent, DomainEventBus};
pub use repositories::ConfigRepository;
pub use services::EventProcessorService;

use alloc::string::String;

/// Errors raised while building or loading a rule set, as opposed to
/// [`crate::error::CoreError`], which covers errors from an already-built
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A context referenced a stage index that doesn't exist.
    StageIndexOutOfRange(usize),
    /// The underlying rule set failed to validate (wraps [`crate::error::CoreError`]'s message).
    InvalidRuleSet(String),
    /// No compiled rule set is loaded yet.
    NotLoaded,
}

impl core::fmt::Display for DomainError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StageIndexOutOfRange(i) => write!(f, "stage index {i} out of range"),
            Self::InvalidRuleSet(msg) => write!(f, "invalid rule set: {msg}"),
            Self::NotLoaded => write!(f, "no rule set loaded"),
        }
    }
}
