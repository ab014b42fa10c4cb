//! Telemetry events the engine can publish as it runs, independent of any
//! particular logging backend (§11: `log` is used directly in the hot path;
//! this bus is for callers that want a structured, replayable record instead).

use alloc::vec::Vec;

use crate::event::{KeyEvent, KeyState};
use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    /// A physical key transitioned.
    InputObserved(KeyEvent),
    /// A rule matched and its output was applied.
    RuleMatched { context_index: usize, trigger: Key },
    /// A virtual key toggled.
    VirtualKeyChanged { key: Key, down: bool },
    /// A context's modifier/device filter changed activation state.
    ContextActivated { context_index: usize, active: bool },
    /// A compiled rule set finished loading.
    ConfigurationLoaded,
    /// A watched rule-set file changed and was reloaded.
    ConfigurationReloaded,
}

impl DomainEvent {
    pub fn from_output_event(event: KeyEvent) -> Option<Self> {
        if event.key.is_virtual() {
            return Some(DomainEvent::VirtualKeyChanged { key: event.key, down: event.state == KeyState::Down });
        }
        None
    }
}

/// Collects [`DomainEvent`]s for a caller to drain and log, record, or relay
/// over a status channel.
#[derive(Debug, Default)]
pub struct DomainEventBus {
    events: Vec<DomainEvent>,
}

impl DomainEventBus {
    pub fn new() -> Self {
        DomainEventBus { events: Vec::new() }
    }

    pub fn publish(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<DomainEvent> {
        core::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
