//! The translation engine: sequence matching (§4.1), per-stage state (§4.2),
//! and stage chaining (§4.4).

pub mod matcher;
pub mod multistage;
pub mod stage;

pub use matcher::{match_sequence, AnyBindings, MatchResult};
pub use multistage::MultiStage;
pub use stage::Stage;
