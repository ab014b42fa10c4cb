//! The boundary between the core and wherever a compiled rule set actually
//! lives (disk, a daemon's reload channel, a test fixture). `kremap_core`
//! only owns the trait; an implementation lives in the host crate, matching
//! the teacher's split between `keyrx_core::config` (data model) and the
//! daemon's own config-loading code.

use alloc::string::String;
use alloc::vec::Vec;

use crate::context::Context;
use crate::event::KeyEvent;

use super::DomainError;

/// A compiled rule set: one [`Context`] group per stage, plus the exit
/// gesture recognized by the first stage (§12).
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    pub stages: Vec<Vec<Context>>,
    pub exit_sequence: Vec<KeyEvent>,
}

/// Supplies a [`CompiledRuleSet`] by name. Implemented by `kremap_runtime`
/// against an on-disk file (reusing the wire `configuration` message's own
/// binary encoding), watched with the 250 ms debounce specified in §4.7; a
/// test double can just hold one in memory.
pub trait ConfigRepository {
    fn load(&self, name: &str) -> Result<CompiledRuleSet, DomainError>;
    fn list(&self) -> Result<Vec<String>, DomainError>;
    fn exists(&self, name: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct InMemoryConfigRepository {
        configs: Vec<(String, CompiledRuleSet)>,
    }

    impl ConfigRepository for InMemoryConfigRepository {
        fn load(&self, name: &str) -> Result<CompiledRuleSet, DomainError> {
            self.configs.iter().find(|(n, _)| n == name).map(|(_, c)| c.clone()).ok_or(DomainError::NotLoaded)
        }
        fn list(&self) -> Result<Vec<String>, DomainError> {
            Ok(self.configs.iter().map(|(n, _)| n.clone()).collect())
        }
        fn exists(&self, name: &str) -> bool {
            self.configs.iter().any(|(n, _)| n == name)
        }
    }

    #[test]
    fn loads_by_name_and_reports_missing() {
        let repo = InMemoryConfigRepository { configs: vec![("default".into(), CompiledRuleSet::default())] };
        assert!(repo.exists("default"));
        assert!(repo.load("default").is_ok());
        assert!(matches!(repo.load("missing"), Err(DomainError::NotLoaded)));
    }
}
