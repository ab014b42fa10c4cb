//! The compiled rule set as a single consistency boundary: a sequence of
//! stages that must each validate before any of them runs (§4.4, Invariant 5).

use alloc::format;
use alloc::vec::Vec;

use crate::context::Context;
use crate::event::KeyEvent;
use crate::runtime::multistage::MultiStage;
use crate::runtime::stage::Stage;

use super::DomainError;

/// Aggregate root over a compiled rule set: one [`Context`] grouping per
/// stage, built into a runnable [`MultiStage`] only if every stage validates.
pub struct RuleSetAggregate {
    multistage: MultiStage,
}

impl RuleSetAggregate {
    /// Builds a [`MultiStage`] from per-stage context groups. Only the first
    /// stage recognizes `exit_sequence` (§12: exit gesture is scoped to
    /// physical input, not any stage's synthesized output).
    pub fn build(stage_contexts: Vec<Vec<Context>>, exit_sequence: Vec<KeyEvent>) -> Result<Self, DomainError> {
        if stage_contexts.is_empty() {
            return Err(DomainError::InvalidRuleSet("rule set must have at least one stage".into()));
        }

        let mut stages = Vec::with_capacity(stage_contexts.len());
        for (index, contexts) in stage_contexts.into_iter().enumerate() {
            let built = if index == 0 {
                Stage::with_exit_sequence(contexts, exit_sequence.clone())
            } else {
                Stage::new(contexts)
            };
            let stage = built.map_err(|e| DomainError::InvalidRuleSet(format!("stage {index}: {e}")))?;
            stages.push(stage);
        }

        Ok(RuleSetAggregate { multistage: MultiStage::new(stages) })
    }

    pub fn multistage(&self) -> &MultiStage {
        &self.multistage
    }

    pub fn multistage_mut(&mut self) -> &mut MultiStage {
        &mut self.multistage
    }

    pub fn into_multistage(self) -> MultiStage {
        self.multistage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Rule;
    use crate::event::{KeyEvent, KeyState, KeySequence};
    use crate::key::Key;

    #[test]
    fn rejects_empty_stage_list() {
        let result = RuleSetAggregate::build(Vec::new(), Vec::new());
        assert!(matches!(result, Err(DomainError::InvalidRuleSet(_))));
    }

    #[test]
    fn rejects_malformed_not_expression_from_any_stage() {
        let mut ctx = Context::new();
        ctx.outputs.push(KeySequence::from_events(alloc::vec![KeyEvent::new(Key::physical(2), KeyState::Down)]));
        ctx.inputs.push(Rule {
            expression: KeySequence::from_events(alloc::vec![KeyEvent::new(Key::NONE, KeyState::Not)]),
            output_index: 0,
        });
        let result = RuleSetAggregate::build(alloc::vec![Vec::new(), alloc::vec![ctx]], Vec::new());
        assert!(matches!(result, Err(DomainError::InvalidRuleSet(_))));
    }

    #[test]
    fn builds_a_runnable_multistage_from_valid_stages() {
        let mut ctx = Context::new();
        ctx.outputs.push(KeySequence::from_events(alloc::vec![
            KeyEvent::new(Key::physical(2), KeyState::Down),
            KeyEvent::new(Key::physical(2), KeyState::Up),
        ]));
        ctx.inputs.push(Rule {
            expression: KeySequence::from_events(alloc::vec![
                KeyEvent::new(Key::physical(1), KeyState::Down),
                KeyEvent::new(Key::physical(1), KeyState::Up),
            ]),
            output_index: 0,
        });
        let aggregate = RuleSetAggregate::build(alloc::vec![alloc::vec![ctx]], Vec::new()).unwrap();
        assert_eq!(aggregate.multistage().stages().len(), 1);
    }
}
