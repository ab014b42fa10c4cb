//! Virtual-key and action bookkeeping (§4.5).

use crate::event::{KeyEvent, KeyState};
use crate::key::Key;
use bitvec::prelude::*;

/// Bound on cyclic virtual-key toggle recursion depth (§4.2.1, §9).
pub const MAX_TOGGLE_DEPTH: u8 = 8;

/// A bit-set of size `last_virtual - first_virtual` (§4.5).
#[derive(Debug, Clone)]
pub struct VirtualKeys {
    bits: BitVec<u8, Lsb0>,
}

impl VirtualKeys {
    pub fn new() -> Self {
        VirtualKeys { bits: bitvec![u8, Lsb0; 0; 256] }
    }

    pub fn is_down(&self, key: Key) -> bool {
        key.virtual_index().map(|i| self.bits[i as usize]).unwrap_or(false)
    }

    /// Transitions a virtual key per `state`. `Not` toggles. Returns the new
    /// boolean state if it changed, or `None` if this was a no-op
    /// (Invariant 4: "setting it to the same state is a no-op").
    pub fn transition(&mut self, key: Key, state: KeyState) -> Option<bool> {
        let idx = key.virtual_index()? as usize;
        let current = self.bits[idx];
        let new_state = match state {
            KeyState::Down => true,
            KeyState::Up => false,
            KeyState::Not => !current,
            _ => return None,
        };
        if new_state == current {
            return None;
        }
        self.bits.set(idx, new_state);
        Some(new_state)
    }
}

impl Default for VirtualKeys {
    fn default() -> Self {
        VirtualKeys::new()
    }
}

/// Applies `directive.virtual_keys_toggle == false` semantics: `Down` is
/// idempotent-down (no toggle), a separate `Not` is required to clear.
pub fn non_toggling_down_event(key: Key) -> KeyEvent {
    KeyEvent::new(key, KeyState::Down)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_same_state_is_noop() {
        let mut vk = VirtualKeys::new();
        let k = Key::virtual_key(0);
        assert_eq!(vk.transition(k, KeyState::Down), Some(true));
        assert_eq!(vk.transition(k, KeyState::Down), None);
    }

    #[test]
    fn not_toggles() {
        let mut vk = VirtualKeys::new();
        let k = Key::virtual_key(1);
        assert!(!vk.is_down(k));
        assert_eq!(vk.transition(k, KeyState::Not), Some(true));
        assert!(vk.is_down(k));
        assert_eq!(vk.transition(k, KeyState::Not), Some(false));
        assert!(!vk.is_down(k));
    }

    #[test]
    fn non_virtual_key_is_rejected() {
        let mut vk = VirtualKeys::new();
        assert_eq!(vk.transition(Key::physical(1), KeyState::Down), None);
    }
}
