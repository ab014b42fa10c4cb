//! MultiStage (C4, §4.4): chains stages so the output of stage *k* is the
//! input of stage *k+1*.

use crate::event::{KeyEvent, KeySequence};
use crate::key::Key;
use crate::runtime::stage::Stage;
use alloc::vec::Vec;

fn is_server_event(event: &KeyEvent) -> bool {
    event.key.is_server_event_key()
}

/// Chains stages; threads timeouts, virtual-key toggles, and action events
/// through all stages (§4.4).
pub struct MultiStage {
    stages: Vec<Stage>,
}

impl MultiStage {
    pub fn new(stages: Vec<Stage>) -> Self {
        MultiStage { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn has_mouse_mappings(&self) -> bool {
        self.stages.iter().any(|s| s.has_mouse_mappings())
    }

    pub fn has_device_filters(&self) -> bool {
        self.stages.iter().any(|s| s.has_device_filters())
    }

    pub fn is_clear(&self) -> bool {
        self.stages.iter().all(|s| s.is_clear())
    }

    pub fn get_output_keys_down(&self) -> Vec<Key> {
        self.stages.last().map(|s| s.get_output_keys_down()).unwrap_or_default()
    }

    pub fn evaluate_device_filters(&mut self, device_names: &[alloc::string::String]) {
        for stage in &mut self.stages {
            stage.evaluate_device_filters(device_names);
        }
    }

    /// Only the first stage's exit gesture is recognized (`SPEC_FULL.md`
    /// §12: scoped to physical input, not any intermediate stage's output).
    pub fn should_exit(&self) -> bool {
        self.stages.first().map(|s| s.should_exit()).unwrap_or(false)
    }

    pub fn validate_state(&self, is_down: impl Fn(Key) -> bool) -> Vec<Key> {
        self.stages.first().map(|s| s.validate_state(is_down)).unwrap_or_default()
    }

    /// Splits `indices` into per-stage sub-ranges by context-count offset,
    /// then threads the resulting events through all stages in order
    /// (§4.4).
    pub fn set_active_client_contexts(&mut self, indices: &[usize]) -> KeySequence {
        let mut context_offset = 0usize;
        let mut carry: Vec<KeyEvent> = Vec::new();
        let mut output: Vec<KeyEvent> = Vec::new();

        for stage in &mut self.stages {
            let input = core::mem::take(&mut carry);
            output.clear();
            for event in input {
                if is_server_event(&event) {
                    output.push(event);
                } else {
                    output.extend(stage.update(event, None));
                }
            }

            let stage_context_count = stage.contexts().len();
            let indices_begin = context_offset;
            let indices_end = context_offset + stage_context_count;
            context_offset = indices_end;

            let local_indices: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| i >= indices_begin && i < indices_end)
                .map(|i| i - indices_begin)
                .collect();
            output.extend(stage.set_active_client_contexts(&local_indices));
            carry = core::mem::take(&mut output);
        }
        KeySequence::from_events(carry)
    }

    /// `update(event, device_index) → KeySequence` (§4.4).
    ///
    /// The incoming `event` is delivered to the first stage only; later
    /// stages see whatever that stage emits. A stage's own `update()`
    /// forwards server-event keys (timeout, virtual, action) verbatim
    /// through its own buffer handling (`update_output`), so a later stage
    /// only ever sees already-resolved events from its predecessor, never
    /// the raw input event a second time.
    pub fn update(&mut self, event: KeyEvent, device_index: Option<usize>) -> KeySequence {
        let mut carry = alloc::vec![event];
        let mut first_stage = true;

        for stage in &mut self.stages {
            let input = core::mem::take(&mut carry);
            let mut output: Vec<KeyEvent> = Vec::new();
            for evt in input {
                if !first_stage && is_server_event(&evt) {
                    output.push(evt);
                } else {
                    output.extend(stage.update(evt, device_index));
                }
            }
            carry = output;
            first_stage = false;
        }
        KeySequence::from_events(carry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Rule};
    use crate::event::{KeyEvent, KeyState, KeySequence as Seq};

    fn seq(events: &[KeyEvent]) -> Seq {
        Seq::from_events(events.to_vec())
    }

    #[test]
    fn two_stage_pipeline_chains_output_to_input() {
        // Stage 0: D >> S
        let d = Key::physical(1);
        let s_key = Key::physical(2);
        let mut stage0_ctx = Context::new();
        stage0_ctx.outputs.push(seq(&[KeyEvent::new(s_key, KeyState::Down), KeyEvent::new(s_key, KeyState::Up)]));
        stage0_ctx.inputs.push(Rule {
            expression: seq(&[KeyEvent::new(d, KeyState::Down), KeyEvent::new(d, KeyState::Up)]),
            output_index: 0,
        });
        let mut stage0 = Stage::new(alloc::vec![stage0_ctx]).unwrap();
        stage0.set_active_client_contexts(&[0]);

        // Stage 1: S >> R
        let r_key = Key::physical(3);
        let mut stage1_ctx = Context::new();
        stage1_ctx.outputs.push(seq(&[KeyEvent::new(r_key, KeyState::Down), KeyEvent::new(r_key, KeyState::Up)]));
        stage1_ctx.inputs.push(Rule {
            expression: seq(&[KeyEvent::new(s_key, KeyState::Down), KeyEvent::new(s_key, KeyState::Up)]),
            output_index: 0,
        });
        let mut stage1 = Stage::new(alloc::vec![stage1_ctx]).unwrap();
        stage1.set_active_client_contexts(&[0]);

        let mut multi = MultiStage::new(alloc::vec![stage0, stage1]);
        multi.update(KeyEvent::new(d, KeyState::Down), None);
        let out = multi.update(KeyEvent::new(d, KeyState::Up), None);
        assert!(out.as_slice().iter().any(|e| e.key == r_key && e.state == KeyState::Down));
        assert!(out.as_slice().iter().any(|e| e.key == r_key && e.state == KeyState::Up));
    }
}
