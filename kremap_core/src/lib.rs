#![no_std]

//! kremap_core - the platform-agnostic translation engine.
//!
//! Holds the key/event data model, the sequence matcher, per-stage state,
//! and stage chaining. No sockets, no device I/O; those live in
//! `kremap_runtime` against this crate's traits.

extern crate alloc;

pub mod context;
pub mod domain;
pub mod error;
pub mod event;
pub mod key;
pub mod runtime;
pub mod virtual_key;

#[cfg(feature = "testing")]
pub mod testing;

pub use context::{Context, Directive, Rule};
pub use error::CoreError;
pub use event::{KeyEvent, KeySequence, KeyState};
pub use key::Key;
pub use runtime::{MultiStage, Stage};
