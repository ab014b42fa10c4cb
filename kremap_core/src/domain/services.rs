//! Drives a [`RuleSetAggregate`]'s [`MultiStage`] and narrates the result as
//! [`DomainEvent`]s, for callers that want a structured record in addition
//! to the raw output [`KeySequence`].

use crate::event::{KeyEvent, KeySequence};

use super::aggregates::RuleSetAggregate;
use super::events::{DomainEvent, DomainEventBus};

pub struct EventProcessorService {
    rule_set: RuleSetAggregate,
    events: DomainEventBus,
}

impl EventProcessorService {
    pub fn new(rule_set: RuleSetAggregate) -> Self {
        EventProcessorService { rule_set, events: DomainEventBus::new() }
    }

    pub fn process(&mut self, event: KeyEvent, device_index: Option<usize>) -> KeySequence {
        self.events.publish(DomainEvent::InputObserved(event));
        let output = self.rule_set.multistage_mut().update(event, device_index);
        for out_event in output.iter() {
            if let Some(domain_event) = DomainEvent::from_output_event(*out_event) {
                if let DomainEvent::VirtualKeyChanged { key, down } = domain_event {
                    log::trace!("virtual key {key:?} toggled {}", if down { "on" } else { "off" });
                }
                self.events.publish(domain_event);
            }
        }
        output
    }

    pub fn rule_set(&self) -> &RuleSetAggregate {
        &self.rule_set
    }

    pub fn drain_events(&mut self) -> alloc::vec::Vec<DomainEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Rule};
    use crate::event::KeyState;
    use crate::key::Key;

    #[test]
    fn process_publishes_input_and_virtual_key_events() {
        let f1 = Key::physical(1);
        let v1 = Key::virtual_key(0);
        let mut ctx = Context::new();
        ctx.outputs.push(KeySequence::from_events(alloc::vec![KeyEvent::new(v1, KeyState::Not)]));
        ctx.inputs.push(Rule {
            expression: KeySequence::from_events(alloc::vec![KeyEvent::new(f1, KeyState::Down), KeyEvent::new(f1, KeyState::Up)]),
            output_index: 0,
        });
        let aggregate = RuleSetAggregate::build(alloc::vec![alloc::vec![ctx]], alloc::vec![]).unwrap();
        let mut service = EventProcessorService::new(aggregate);
        service.rule_set.multistage_mut().set_active_client_contexts(&[0]);

        service.process(KeyEvent::new(f1, KeyState::Down), None);
        service.process(KeyEvent::new(f1, KeyState::Up), None);

        let events = service.drain_events();
        assert!(events.iter().any(|e| matches!(e, DomainEvent::InputObserved(evt) if evt.key == f1)));
        assert!(events.iter().any(|e| matches!(e, DomainEvent::VirtualKeyChanged { key, down: true } if *key == v1)));
    }
}
