//! Stage (C3, §4.2): one context set's translation state machine.

use crate::context::{modifier_filter_matches, CompiledDeviceFilter, Context};
use crate::error::CoreError;
use crate::event::{KeyEvent, KeySequence, KeyState};
use crate::key::Key;
use crate::runtime::matcher::{match_sequence, AnyBindings, MatchResult, TimeoutRequest};
use crate::virtual_key::{VirtualKeys, MAX_TOGGLE_DEPTH};
use alloc::vec::Vec;
use hashbrown::HashSet;

/// Sentinel device index meaning "no physical device" (synthetic events:
/// virtual-key replays, `ContextActive`, timeouts).
pub const NO_DEVICE_INDEX: Option<usize> = None;

#[derive(Debug, Clone)]
struct OutputDownEntry {
    key: Key,
    trigger: Key,
    suppressed: bool,
    temporarily_released: bool,
    context_index: usize,
}

#[derive(Debug, Clone)]
struct OutputOnReleaseEntry {
    trigger: Key,
    remaining: KeySequence,
    context_index: usize,
}

#[derive(Debug, Clone)]
struct CurrentTimeout {
    output_index: i32,
    context_index: usize,
    bindings: AnyBindings,
    threshold_millis: u16,
    /// `true` for a "not-timeout" (`!Nms`) guard: matches iff elapsed <
    /// threshold. `false` for a plain timeout guard: matches iff elapsed >=
    /// threshold (§4.1 step 4).
    not_timeout: bool,
    /// The buffered events that were pending when this timeout armed, used
    /// to forward them verbatim if the guard fails to hold (§8 scenario 4).
    pending: Vec<KeyEvent>,
}

/// Holds one context set; consumes one event, emits zero or more (§4.2).
pub struct Stage {
    contexts: Vec<Context>,
    compiled_filters: Vec<CompiledDeviceFilter>,
    device_matches: Vec<hashbrown::HashMap<usize, bool>>,

    active_client_contexts: Vec<usize>,
    active_contexts: Vec<usize>,
    prev_active_contexts: Vec<usize>,

    sequence: Vec<KeyEvent>,
    sequence_might_match: bool,

    output_down: Vec<OutputDownEntry>,
    output_on_release: Vec<OutputOnReleaseEntry>,
    current_timeout: Option<CurrentTimeout>,

    virtual_keys: VirtualKeys,
    held_physical: HashSet<Key>,

    has_mouse_mappings: bool,
    has_device_filters: bool,

    exit_sequence: Vec<KeyEvent>,
    exit_sequence_position: usize,
}

impl Stage {
    pub fn new(contexts: Vec<Context>) -> Result<Self, CoreError> {
        Self::with_exit_sequence(contexts, Vec::new())
    }

    /// `exit_sequence` is the gesture that triggers `should_exit()` (§4.2.2,
    /// §12 of `SPEC_FULL.md`). The original hardcodes this to a specific
    /// physical-key combination; since this crate does not own the
    /// physical-key enumeration, the caller supplies it.
    pub fn with_exit_sequence(contexts: Vec<Context>, exit_sequence: Vec<KeyEvent>) -> Result<Self, CoreError> {
        let mut compiled_filters = Vec::with_capacity(contexts.len());
        let mut has_device_filters = false;
        let mut has_mouse_mappings = false;
        for (index, ctx) in contexts.iter().enumerate() {
            if !ctx.device_filter.pattern.is_empty() {
                has_device_filters = true;
            }
            for rule in &ctx.inputs {
                for entry in rule.expression.as_slice() {
                    if entry.key.is_none() {
                        return Err(CoreError::MalformedNotExpression { context_index: index });
                    }
                }
            }
            compiled_filters.push(ctx.device_filter.compile()?);
            has_mouse_mappings |= ctx.outputs.iter().any(|o| {
                o.as_slice().iter().any(|e| e.value > 0 && e.state == KeyState::Down)
            });
        }
        Ok(Stage {
            contexts,
            compiled_filters,
            device_matches: Vec::new(),
            active_client_contexts: Vec::new(),
            active_contexts: Vec::new(),
            prev_active_contexts: Vec::new(),
            sequence: Vec::new(),
            sequence_might_match: false,
            output_down: Vec::new(),
            output_on_release: Vec::new(),
            current_timeout: None,
            virtual_keys: VirtualKeys::new(),
            held_physical: HashSet::new(),
            has_mouse_mappings,
            has_device_filters,
            exit_sequence,
            exit_sequence_position: 0,
        })
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn has_mouse_mappings(&self) -> bool {
        self.has_mouse_mappings
    }

    pub fn has_device_filters(&self) -> bool {
        self.has_device_filters
    }

    pub fn is_clear(&self) -> bool {
        self.output_down.is_empty() && self.sequence.is_empty() && self.current_timeout.is_none()
    }

    pub fn get_output_keys_down(&self) -> Vec<Key> {
        self.output_down.iter().filter(|e| !e.temporarily_released).map(|e| e.key).collect()
    }

    pub fn should_exit(&self) -> bool {
        !self.exit_sequence.is_empty() && self.exit_sequence_position >= self.exit_sequence.len()
    }

    /// Checks the caller's view of "is `key` down" against this stage's own
    /// bookkeeping, returning the keys that disagree (supplemented feature,
    /// `SPEC_FULL.md` §12).
    pub fn validate_state(&self, is_down: impl Fn(Key) -> bool) -> Vec<Key> {
        self.get_output_keys_down().into_iter().filter(|&k| !is_down(k)).collect()
    }

    /// Precomputes, for each context, which device indices its filter
    /// matches (§4.3: "evaluated once at device-attach").
    pub fn evaluate_device_filters(&mut self, device_names: &[alloc::string::String]) {
        self.device_matches.clear();
        for filter in &self.compiled_filters {
            let mut map = hashbrown::HashMap::new();
            for (index, name) in device_names.iter().enumerate() {
                map.insert(index, filter.matches(name));
            }
            self.device_matches.push(map);
        }
    }

    fn device_matches_filter(&self, context_index: usize, device_index: Option<usize>) -> bool {
        match device_index {
            None => true,
            Some(idx) => self
                .device_matches
                .get(context_index)
                .and_then(|m| m.get(&idx))
                .copied()
                .unwrap_or(true),
        }
    }

    fn is_down(&self, key: Key) -> bool {
        if key.is_virtual() {
            self.virtual_keys.is_down(key)
        } else {
            self.held_physical.contains(&key)
        }
    }

    /// Recomputes `active_contexts` from `active_client_contexts` plus
    /// device/modifier filters, and returns `ContextActive` transition
    /// output for any context that just (de)activated (§4.3).
    fn recompute_active_contexts(&mut self, device_index: Option<usize>) -> KeySequence {
        core::mem::swap(&mut self.prev_active_contexts, &mut self.active_contexts);
        self.active_contexts.clear();
        for &index in &self.active_client_contexts {
            let Some(ctx) = self.contexts.get(index) else { continue };
            let device_ok = self.device_matches_filter(index, device_index);
            let modifier_ok = modifier_filter_matches(&ctx.modifier_filter, ctx.invert_modifier_filter, |k| self.is_down(k));
            if device_ok && modifier_ok {
                self.active_contexts.push(index);
            }
        }

        let mut out = KeySequence::new();
        for &index in &self.active_contexts {
            if !self.prev_active_contexts.contains(&index) {
                self.fire_context_active(index, true, &mut out);
            }
        }
        for &index in &self.prev_active_contexts {
            if !self.active_contexts.contains(&index) {
                self.fire_context_active(index, false, &mut out);
            }
        }
        out
    }

    fn fire_context_active(&mut self, context_index: usize, activated: bool, out: &mut KeySequence) {
        let Some(ctx) = self.contexts.get(context_index) else { return };
        if !ctx.has_context_active_input() {
            return;
        }
        let target_state = if activated { KeyState::Down } else { KeyState::Up };
        let rules: Vec<(KeySequence, i32)> = ctx
            .inputs
            .iter()
            .filter(|r| {
                r.expression.as_slice().len() == 1
                    && r.expression.as_slice()[0].key.is_context_active()
                    && r.expression.as_slice()[0].state == target_state
            })
            .map(|r| (r.expression.clone(), r.output_index))
            .collect();
        for (_, output_index) in rules {
            if let Some(output) = self.contexts[context_index].find_output(output_index).cloned() {
                self.apply_output(&output, &[], Key::CONTEXT_ACTIVE, context_index, out, 0);
            }
        }
    }

    pub fn set_active_client_contexts(&mut self, indices: &[usize]) -> KeySequence {
        self.active_client_contexts = indices.to_vec();
        self.recompute_active_contexts(NO_DEVICE_INDEX)
    }

    /// `update(event, device_index) → KeySequence` (§4.2 entry point).
    pub fn update(&mut self, event: KeyEvent, device_index: Option<usize>) -> KeySequence {
        let mut out = KeySequence::new();

        // Step 1: reconcile a timeout reply with the armed timeout.
        if event.key.is_timeout() {
            if let Some(timeout) = self.current_timeout.take() {
                let elapsed = event.value;
                let holds = if timeout.not_timeout {
                    elapsed < timeout.threshold_millis
                } else {
                    elapsed >= timeout.threshold_millis
                };
                if holds {
                    if let Some(output) = self.contexts.get(timeout.context_index).and_then(|c| c.find_output(timeout.output_index)).cloned() {
                        let trigger = timeout.pending.last().map(|e| e.key).unwrap_or(Key::TIMEOUT);
                        self.apply_output(&output, &timeout.bindings, trigger, timeout.context_index, &mut out, 0);
                    }
                } else {
                    for pending in &timeout.pending {
                        match pending.state {
                            KeyState::Down => self.update_output(*pending, pending.key, usize::MAX, &mut out, 0),
                            KeyState::Up => self.release_triggered(pending.key, &mut out),
                            _ => {}
                        }
                    }
                }
                self.sequence.clear();
                self.finish_sequence();
                return out;
            }
        }

        // Step 2: drop stale DownMatched on key-repeat.
        if event.state == KeyState::Down {
            if let Some(pos) = self.sequence.iter().position(|e| e.key == event.key && e.state == KeyState::DownMatched) {
                self.sequence.remove(pos);
            }
        }

        // Step 3: append to buffer.
        self.sequence.push(event);
        if event.key.is_physical() {
            match event.state {
                KeyState::Down => {
                    self.held_physical.insert(event.key);
                }
                KeyState::Up => {
                    self.held_physical.remove(&event.key);
                }
                _ => {}
            }
        }
        self.advance_exit_sequence(event);

        // Step 4: release triggered outputs on Up.
        if event.state == KeyState::Up {
            // A `DownMatched` left over from this key's own matched press no
            // longer has anything to guard once its `Up` has arrived and no
            // rule is still pending on it; erase it so a later replay of the
            // buffer can't re-match it (§8 boundary property).
            if !self.sequence_might_match {
                if let Some(pos) = self.sequence.iter().position(|e| e.key == event.key && e.state == KeyState::DownMatched) {
                    self.sequence.remove(pos);
                }
            }
            self.release_triggered(event.key, &mut out);
            self.advance_output_on_release(event.key, &mut out);
        }

        let context_active_output = self.recompute_active_contexts(device_index);
        for evt in context_active_output {
            out.push(evt);
        }

        let active = self.active_contexts.clone();
        let mut matched_any = false;
        let mut any_might_match = false;
        'contexts: for &context_index in &active {
            let (inputs, fallthrough) = {
                let ctx = &self.contexts[context_index];
                (ctx.inputs.clone(), ctx.fallthrough)
            };
            for rule in &inputs {
                let (result, bindings, timeout_request) = match_sequence(rule.expression.as_slice(), &self.sequence);
                match result {
                    MatchResult::NoMatch => continue,
                    MatchResult::MightMatch => {
                        self.sequence_might_match = true;
                        any_might_match = true;
                        if let Some(req) = timeout_request {
                            self.arm_timeout(req, rule.output_index, context_index, bindings, &mut out);
                        }
                        continue 'contexts;
                    }
                    MatchResult::Match => {
                        let trigger = last_event_key(rule.expression.as_slice());
                        if let Some(output) = self.contexts[context_index].find_output(rule.output_index).cloned() {
                            self.apply_output(&output, &bindings, trigger, context_index, &mut out, 0);
                        }
                        self.finish_sequence();
                        matched_any = true;
                        break 'contexts;
                    }
                }
            }
            if !fallthrough {
                break;
            }
        }

        if matched_any {
            return out;
        }
        if any_might_match {
            return out;
        }

        // Step 6: forward the buffer verbatim.
        self.sequence_might_match = false;
        let snapshot = self.sequence.clone();
        for evt in &snapshot {
            match evt.state {
                KeyState::Down => self.update_output(*evt, evt.key, usize::MAX, &mut out, 0),
                KeyState::Up => self.release_triggered(evt.key, &mut out),
                _ => {}
            }
        }
        self.finish_sequence();
        out
    }

    /// Arming a new timeout replaces any previous one for this stage
    /// (Invariant 3).
    fn arm_timeout(&mut self, request: TimeoutRequest, output_index: i32, context_index: usize, bindings: AnyBindings, out: &mut KeySequence) {
        self.current_timeout = Some(CurrentTimeout {
            output_index,
            context_index,
            bindings,
            threshold_millis: request.millis,
            not_timeout: request.cancel_on_up,
            pending: self.sequence.clone(),
        });
        out.push(KeyEvent::timeout_request(request.millis, request.cancel_on_up));
    }

    fn advance_exit_sequence(&mut self, event: KeyEvent) {
        if self.exit_sequence.is_empty() {
            return;
        }
        if self.exit_sequence_position < self.exit_sequence.len() && self.exit_sequence[self.exit_sequence_position] == event {
            self.exit_sequence_position += 1;
        } else if self.exit_sequence[0] == event {
            self.exit_sequence_position = 1;
        } else {
            self.exit_sequence_position = 0;
        }
    }

    fn advance_output_on_release(&mut self, released_key: Key, out: &mut KeySequence) {
        let mut remaining = Vec::new();
        let entries = core::mem::take(&mut self.output_on_release);
        for entry in entries {
            if entry.trigger == released_key {
                self.apply_output(&entry.remaining, &[], entry.trigger, entry.context_index, out, 0);
            } else {
                remaining.push(entry);
            }
        }
        self.output_on_release = remaining;
    }

    /// `Up` emissions for a trigger's `output_down` entries are issued LIFO
    /// (§5).
    fn release_triggered(&mut self, key: Key, out: &mut KeySequence) {
        let mut released_indices = Vec::new();
        for (idx, entry) in self.output_down.iter().enumerate() {
            if entry.trigger == key && !entry.temporarily_released {
                released_indices.push(idx);
            }
        }
        for &idx in released_indices.iter().rev() {
            let entry = self.output_down.remove(idx);
            out.push(KeyEvent::new(entry.key, KeyState::Up));
        }
    }

    fn reapply_temporarily_released(&mut self, out: &mut KeySequence) {
        for entry in self.output_down.iter_mut() {
            if entry.temporarily_released && !entry.suppressed {
                entry.temporarily_released = false;
                out.push(KeyEvent::new(entry.key, KeyState::Down));
            }
        }
    }

    /// Applies an output expression in order (§4.2.1).
    fn apply_output(&mut self, seq: &KeySequence, bindings: &[Key], trigger: Key, context_index: usize, out: &mut KeySequence, depth: u8) {
        let mut binding_cursor = 0usize;
        let events: Vec<KeyEvent> = seq.as_slice().to_vec();
        for (i, raw_event) in events.iter().enumerate() {
            let event = if raw_event.key.is_any() {
                let bound = bindings.get(binding_cursor).copied().unwrap_or(raw_event.key);
                binding_cursor += 1;
                KeyEvent { key: bound, ..*raw_event }
            } else {
                *raw_event
            };

            if event.state == KeyState::OutputOnRelease {
                let remaining = KeySequence::from_events(events[i + 1..].to_vec());
                self.output_on_release.push(OutputOnReleaseEntry { trigger, remaining, context_index });
                return;
            }

            self.update_output(event, trigger, context_index, out, depth);
        }
    }

    fn update_output(&mut self, event: KeyEvent, trigger: Key, context_index: usize, out: &mut KeySequence, depth: u8) {
        if event.key.is_virtual() {
            if depth >= MAX_TOGGLE_DEPTH {
                return;
            }
            if let Some(_new_state) = self.virtual_keys.transition(event.key, event.state) {
                out.push(event);
                let replay = KeyEvent::new(event.key, KeyState::Down);
                self.update_output(replay, trigger, context_index, out, depth + 1);
            }
            return;
        }

        if event.key.is_action() {
            out.push(event);
            return;
        }

        if event.key.is_timeout() {
            out.push(event);
            return;
        }

        match event.state {
            KeyState::Down => {
                if let Some(existing) = self.output_down.iter_mut().find(|e| e.key == event.key) {
                    if existing.temporarily_released {
                        existing.temporarily_released = false;
                        out.push(KeyEvent::new(event.key, KeyState::Down));
                    } else {
                        out.push(KeyEvent::new(event.key, KeyState::Down));
                    }
                } else {
                    self.reapply_temporarily_released(out);
                    self.output_down.push(OutputDownEntry {
                        key: event.key,
                        trigger,
                        suppressed: false,
                        temporarily_released: false,
                        context_index,
                    });
                    out.push(KeyEvent::new(event.key, KeyState::Down));
                }
            }
            KeyState::Up => {
                if let Some(pos) = self.output_down.iter().position(|e| e.key == event.key) {
                    self.output_down.remove(pos);
                    out.push(KeyEvent::new(event.key, KeyState::Up));
                }
            }
            KeyState::Not => {
                if let Some(existing) = self.output_down.iter_mut().find(|e| e.key == event.key) {
                    if !existing.temporarily_released {
                        existing.suppressed = true;
                        existing.temporarily_released = true;
                        out.push(KeyEvent::new(event.key, KeyState::Up));
                    }
                }
            }
            _ => {}
        }
    }

    /// Keeps only entries still awaiting their `Up`: a `Down`/`DownMatched`
    /// with no matching `Up` later in the buffer is promoted to (or stays)
    /// `DownMatched`; everything else — a `Down`/`DownMatched` whose `Up` has
    /// arrived, the `Up` itself, or any other leftover entry — is erased
    /// (Invariant 2). Clears `suppressed` flags (§4.2).
    fn finish_sequence(&mut self) {
        let mut kept = Vec::with_capacity(self.sequence.len());
        let mut i = 0;
        while i < self.sequence.len() {
            let event = self.sequence[i];
            if event.state == KeyState::Down || event.state == KeyState::DownMatched {
                let has_up = self.sequence[i + 1..].iter().any(|e| e.key == event.key && e.state == KeyState::Up);
                if !has_up {
                    let promoted = if event.state == KeyState::Down { KeyState::DownMatched } else { event.state };
                    kept.push(KeyEvent { state: promoted, ..event });
                }
            }
            i += 1;
        }
        self.sequence = kept;

        for entry in self.output_down.iter_mut() {
            entry.suppressed = false;
        }
    }
}

fn last_event_key(expr: &[KeyEvent]) -> Key {
    expr.iter().rev().find(|e| !matches!(e.state, KeyState::NoMightMatch)).map(|e| e.key).unwrap_or(Key::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Rule;

    fn seq(events: &[KeyEvent]) -> KeySequence {
        KeySequence::from_events(events.to_vec())
    }

    fn simple_remap_stage(input_key: Key, output_key: Key) -> Stage {
        let mut ctx = Context::new();
        ctx.outputs.push(seq(&[KeyEvent::new(output_key, KeyState::Down), KeyEvent::new(output_key, KeyState::Up)]));
        ctx.inputs.push(Rule {
            expression: seq(&[KeyEvent::new(input_key, KeyState::Down), KeyEvent::new(input_key, KeyState::Up)]),
            output_index: 0,
        });
        let mut stage = Stage::new(alloc::vec![ctx]).unwrap();
        stage.set_active_client_contexts(&[0]);
        stage
    }

    #[test]
    fn simple_remap_produces_expected_output() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let mut stage = simple_remap_stage(a, b);

        let out1 = stage.update(KeyEvent::new(a, KeyState::Down), None);
        assert!(out1.is_empty(), "first event of a 2-event rule should hold back (might_match)");

        let out2 = stage.update(KeyEvent::new(a, KeyState::Up), None);
        assert_eq!(out2.as_slice(), &[KeyEvent::new(b, KeyState::Down), KeyEvent::new(b, KeyState::Up)]);
        assert!(stage.is_clear());
    }

    #[test]
    fn press_only_rule_does_not_rematch_on_release() {
        // A single-key, press-only rule leaves a DownMatched entry in the
        // buffer after it fires; the following -A must release B and clear
        // the buffer, not re-fire the rule against [DownMatched A, -A].
        let a = Key::physical(1);
        let b = Key::physical(2);
        let mut ctx = Context::new();
        ctx.outputs.push(seq(&[KeyEvent::new(b, KeyState::Down)]));
        ctx.inputs.push(Rule { expression: seq(&[KeyEvent::new(a, KeyState::Down)]), output_index: 0 });
        let mut stage = Stage::new(alloc::vec![ctx]).unwrap();
        stage.set_active_client_contexts(&[0]);

        let out1 = stage.update(KeyEvent::new(a, KeyState::Down), None);
        assert_eq!(out1.as_slice(), &[KeyEvent::new(b, KeyState::Down)]);

        let out2 = stage.update(KeyEvent::new(a, KeyState::Up), None);
        assert_eq!(out2.as_slice(), &[KeyEvent::new(b, KeyState::Up)], "must not re-fire +B");
        assert!(stage.is_clear());
    }

    #[test]
    fn balanced_output_invariant_holds_after_full_replay() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let mut stage = simple_remap_stage(a, b);
        stage.update(KeyEvent::new(a, KeyState::Down), None);
        stage.update(KeyEvent::new(a, KeyState::Up), None);
        assert!(stage.get_output_keys_down().is_empty());
        assert!(stage.is_clear());
    }

    #[test]
    fn output_on_release_splits_the_output() {
        let f1 = Key::physical(10);
        let x = Key::physical(20);
        let y = Key::physical(21);
        let mut ctx = Context::new();
        ctx.outputs.push(seq(&[
            KeyEvent::new(x, KeyState::Down),
            KeyEvent::new(x, KeyState::Up),
            KeyEvent::new(Key::NONE, KeyState::OutputOnRelease),
            KeyEvent::new(y, KeyState::Down),
            KeyEvent::new(y, KeyState::Up),
        ]));
        ctx.inputs.push(Rule {
            expression: seq(&[KeyEvent::new(f1, KeyState::Down), KeyEvent::new(f1, KeyState::Up)]),
            output_index: 0,
        });
        let mut stage = Stage::new(alloc::vec![ctx]).unwrap();
        stage.set_active_client_contexts(&[0]);

        stage.update(KeyEvent::new(f1, KeyState::Down), None);
        let out = stage.update(KeyEvent::new(f1, KeyState::Up), None);
        assert_eq!(
            out.as_slice(),
            &[
                KeyEvent::new(x, KeyState::Down),
                KeyEvent::new(x, KeyState::Up),
                KeyEvent::new(y, KeyState::Down),
                KeyEvent::new(y, KeyState::Up),
            ]
        );
    }

    #[test]
    fn virtual_key_latch_scenario() {
        let f1 = Key::physical(1);
        let x = Key::physical(2);
        let y = Key::physical(3);
        let v1 = Key::virtual_key(0);

        // F1 >> Virtual1 (always active).
        let mut toggler = Context::new();
        toggler.outputs.push(seq(&[KeyEvent::new(v1, KeyState::Not)]));
        toggler.inputs.push(Rule { expression: seq(&[KeyEvent::new(f1, KeyState::Down), KeyEvent::new(f1, KeyState::Up)]), output_index: 0 });

        // Virtual1{X} >> Y, gated by a modifier filter requiring v1 down.
        let mut gated = Context::new();
        gated.modifier_filter.push(KeyEvent::new(v1, KeyState::Down));
        gated.outputs.push(seq(&[KeyEvent::new(y, KeyState::Down), KeyEvent::new(y, KeyState::Up)]));
        gated.inputs.push(Rule { expression: seq(&[KeyEvent::new(x, KeyState::Down), KeyEvent::new(x, KeyState::Up)]), output_index: 0 });

        let mut stage = Stage::new(alloc::vec![toggler, gated]).unwrap();
        stage.set_active_client_contexts(&[0, 1]);

        stage.update(KeyEvent::new(f1, KeyState::Down), None);
        stage.update(KeyEvent::new(f1, KeyState::Up), None);
        assert!(stage.virtual_keys.is_down(v1));

        let out = stage.update(KeyEvent::new(x, KeyState::Down), None);
        let out2 = stage.update(KeyEvent::new(x, KeyState::Up), None);
        let mut all = out.0;
        all.extend(out2.0);
        assert!(all.iter().any(|e| e.key == y && e.state == KeyState::Down));
        assert!(all.iter().any(|e| e.key == y && e.state == KeyState::Up));
    }
}
