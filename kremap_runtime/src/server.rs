//! Server loop (C5, §4.6): owns the wall clock and the virtual device,
//! driving a [`RuleSetAggregate`] one device event at a time.

use kremap_core::domain::RuleSetAggregate;
use kremap_core::event::MAX_VALUE;
use kremap_core::{Key, KeyEvent, KeySequence, KeyState};

use crate::backend::VirtualOutput;
use crate::clock::Clock;

/// A timer armed by a trailing `Key::timeout` request in a `MultiStage.update`
/// result, tracked against the wall clock until it fires or is cancelled
/// (§4.6 steps 2/4, §5 cancellation rules).
struct PendingTimer {
    armed_at_ms: u64,
    threshold_millis: u16,
    cancel_on_up: bool,
}

/// Drives one [`RuleSetAggregate`] against trait-object OS backends. Single
/// owner, single thread (§5): nothing here is `Sync`.
pub struct ServerLoop<C, O> {
    rule_set: RuleSetAggregate,
    clock: C,
    output: O,
    previous_event: Option<KeyEvent>,
    pending_timer: Option<PendingTimer>,
    /// Set when a prior tick's send-buffer flush failed partway through
    /// (§7); key-repeat drop also treats this like a pending timeout.
    flush_pending: bool,
}

impl<C: Clock, O: VirtualOutput> ServerLoop<C, O> {
    pub fn new(rule_set: RuleSetAggregate, clock: C, output: O) -> Self {
        ServerLoop {
            rule_set,
            clock,
            output,
            previous_event: None,
            pending_timer: None,
            flush_pending: false,
        }
    }

    pub fn rule_set(&self) -> &RuleSetAggregate {
        &self.rule_set
    }

    pub fn rule_set_mut(&mut self) -> &mut RuleSetAggregate {
        &mut self.rule_set
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn should_exit(&self) -> bool {
        self.rule_set.multistage().should_exit()
    }

    fn is_key_repeat(&self, event: KeyEvent) -> bool {
        self.previous_event
            .is_some_and(|prev| prev.key == event.key && prev.state == event.state)
    }

    /// Processes one incoming device event end to end (§4.6 steps 1-5).
    pub fn handle_event(&mut self, event: KeyEvent, device_index: Option<usize>) {
        // Step 1: key-repeat drop while a timeout or flush is pending.
        if event.state == KeyState::Down
            && self.is_key_repeat(event)
            && (self.pending_timer.is_some() || self.flush_pending)
        {
            return;
        }
        self.previous_event = Some(event);

        // Step 2: cancel-and-inject. A pending timer is cancelled by any
        // Down, or by Up when the timer was armed in cancel_on_up mode; the
        // synthetic timeout reply is delivered to MultiStage first so its
        // output precedes the triggering event's (§5 ordering guarantee).
        if let Some(timer) = self.pending_timer.take() {
            let cancels = match event.state {
                KeyState::Down => true,
                KeyState::Up => timer.cancel_on_up,
                _ => false,
            };
            if cancels {
                let elapsed = self.clock.now_ms().saturating_sub(timer.armed_at_ms);
                let elapsed = elapsed.min(u64::from(MAX_VALUE)) as u16;
                let synthetic = KeyEvent::with_value(Key::TIMEOUT, KeyState::Down, elapsed);
                let reply = self.rule_set.multistage_mut().update(synthetic, None);
                self.flush(reply);
            } else {
                self.pending_timer = Some(timer);
            }
        }

        // Step 3.
        let result = self.rule_set.multistage_mut().update(event, device_index);

        // Step 4: a trailing Key::timeout in the result is a schedule
        // request, not an event for the OS (Stage::arm_timeout appends it so
        // the server can see it without a separate return channel).
        if let Some(last) = result.as_slice().last() {
            if last.key.is_timeout() {
                let (threshold_millis, cancel_on_up) = KeyEvent::decode_timeout_request(last.value);
                log::trace!("arming timer: {threshold_millis}ms, cancel_on_up={cancel_on_up}");
                self.pending_timer = Some(PendingTimer {
                    armed_at_ms: self.clock.now_ms(),
                    threshold_millis,
                    cancel_on_up,
                });
            }
        }

        // Step 5.
        self.flush(result);
    }

    /// The real-OS path for a scheduled timer firing on its own, independent
    /// of any new device event: if the pending timer (if any) has reached
    /// its threshold against the current clock, inject the synthetic
    /// `Key::timeout` reply now. A no-op if no timer is pending or it hasn't
    /// reached its threshold yet. Callers that drive the engine from a
    /// uniform event loop (e.g. `kremap_sim`) call this after advancing the
    /// clock and before feeding the next device event.
    pub fn poll_timer(&mut self) {
        let Some(timer) = &self.pending_timer else { return };
        let elapsed = self.clock.now_ms().saturating_sub(timer.armed_at_ms);
        if elapsed < u64::from(timer.threshold_millis) {
            return;
        }
        self.pending_timer = None;
        let elapsed = elapsed.min(u64::from(MAX_VALUE)) as u16;
        let synthetic = KeyEvent::with_value(Key::TIMEOUT, KeyState::Down, elapsed);
        let reply = self.rule_set.multistage_mut().update(synthetic, None);
        self.flush(reply);
    }

    /// Enqueues `result` into the send buffer and invokes the OS backend in
    /// order, stopping at the first failure and leaving the rest for the
    /// next tick (§7: "halts the send-buffer flush for the current tick and
    /// reschedules"). The trailing timeout-request marker, if any, never
    /// reaches the OS.
    fn flush(&mut self, result: KeySequence) {
        for event in result.iter().filter(|e| !e.key.is_timeout()) {
            if !self.output.send_key_event(*event) {
                log::warn!("send_key_event failed for {event:?}, halting flush for this tick");
                self.flush_pending = true;
                return;
            }
        }
        self.flush_pending = !self.output.flush();
        if self.flush_pending {
            log::warn!("output flush failed, rescheduling");
        }
    }

    /// §4.6 step 6 / §7 socket-disconnect handling: synthesize `Up` for
    /// every entry in the final stage's `output_down` before the caller
    /// replaces the rule set or disconnects the peer. Does not reset
    /// `previous_event`/`pending_timer`'s clock basis beyond clearing the
    /// timer, since configuration replacement cancels all timers (§5).
    pub fn release_all_output(&mut self) {
        let keys_down = self.rule_set.multistage().get_output_keys_down();
        if !keys_down.is_empty() {
            log::debug!("releasing {} held output key(s)", keys_down.len());
        }
        for key in keys_down {
            self.output.send_key_event(KeyEvent::new(key, KeyState::Up));
        }
        self.output.flush();
        self.pending_timer = None;
        self.flush_pending = false;
    }

    /// Exit-gesture shutdown (§7): release all output, flush, then release
    /// the backend's own OS resources.
    pub fn shutdown(&mut self) {
        log::info!("shutting down server loop");
        self.release_all_output();
        self.output.shutdown();
    }
}
