//! Test-fixture builders shared across this crate's own tests and
//! `kremap_runtime`'s scenario tests. Gated behind the `testing` feature so a
//! production build never pulls this in, mirroring the teacher's own
//! `test_utils` being dev-only.

use alloc::vec::Vec;

use crate::context::{Context, Rule};
use crate::event::{KeyEvent, KeySequence, KeyState};
use crate::key::Key;

/// Builds a single `input >> output` context with no filters, for tests that
/// don't need more than one rule.
pub fn single_rule_context(input: &[KeyEvent], output: &[KeyEvent]) -> Context {
    let mut ctx = Context::new();
    ctx.outputs.push(KeySequence::from_events(output.to_vec()));
    ctx.inputs.push(Rule { expression: KeySequence::from_events(input.to_vec()), output_index: 0 });
    ctx
}

/// `Down` then `Up` of the same key, the shape most simple remap rules use.
pub fn tap(key: Key) -> Vec<KeyEvent> {
    alloc::vec![KeyEvent::new(key, KeyState::Down), KeyEvent::new(key, KeyState::Up)]
}

/// Records every event a [`crate::runtime::Stage`] or [`crate::runtime::MultiStage`]
/// emits across a sequence of `update()` calls, for assertions against the
/// whole output stream rather than one call at a time.
#[derive(Debug, Default)]
pub struct OutputRecorder {
    events: Vec<KeyEvent>,
}

impl OutputRecorder {
    pub fn new() -> Self {
        OutputRecorder { events: Vec::new() }
    }

    pub fn record(&mut self, sequence: KeySequence) {
        self.events.extend(sequence.iter().copied());
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rule_context_builds_one_input_and_output() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let ctx = single_rule_context(&tap(a), &tap(b));
        assert_eq!(ctx.inputs.len(), 1);
        assert_eq!(ctx.outputs.len(), 1);
    }

    #[test]
    fn recorder_accumulates_across_calls() {
        let mut recorder = OutputRecorder::new();
        recorder.record(KeySequence::from_events(tap(Key::physical(1))));
        recorder.record(KeySequence::from_events(tap(Key::physical(2))));
        assert_eq!(recorder.events().len(), 4);
    }
}
