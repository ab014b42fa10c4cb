//! `KeyEvent` and `KeySequence`, the wire format shared by input expressions,
//! output expressions, and the live sequence buffer (§3).

use crate::key::Key;
use alloc::vec::Vec;
use core::cmp::min;

/// Maximum representable `value` (14-bit unsigned, §3).
pub const MAX_VALUE: u16 = (1 << 14) - 1;

/// One standard mouse-wheel detent, used when a wheel `Down` arrives with
/// `value == 0` (§9 Open Question, resolved in `SPEC_FULL.md` §13.2).
pub const DEFAULT_WHEEL_DETENT: u16 = 120;

/// Largest `millis` a [`KeyEvent::timeout_request`] can carry once the top
/// bit of the 14-bit value field is reserved for `cancel_on_up` (8191ms).
pub const TIMEOUT_REQUEST_MAX_MILLIS: u16 = (1 << 13) - 1;

/// `state ∈ { Down, Up, Not, DownAsync, UpAsync, DownMatched, OutputOnRelease, NoMightMatch }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Physical press observed, or to be emitted.
    Down,
    /// Physical release observed, or to be emitted.
    Up,
    /// "Must not be pressed" on input; "release while applying" on output.
    Not,
    /// Input-expression marker: this key may be pressed later, need not be.
    DownAsync,
    /// Input-expression marker: this key may be released later, need not be.
    UpAsync,
    /// Sequence-buffer marker for a `Down` already consumed by a match.
    DownMatched,
    /// Splits an output into "apply now" / "apply on trigger release".
    OutputOnRelease,
    /// Input-expression prefix: never report `might_match` for this rule.
    NoMightMatch,
}

impl KeyState {
    /// `DownMatched` and `Down` are the same state for matching/equality
    /// purposes (§3 `KeySequence`: "Equality ignores `DownMatched` vs `Down`").
    pub const fn unifies_as_down(self) -> bool {
        matches!(self, KeyState::Down | KeyState::DownMatched)
    }
}

/// `(key, state, value)` (§3).
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    /// 14-bit unsigned; callers should route through [`KeyEvent::with_value`]
    /// to get the cap enforced.
    pub value: u16,
}

impl KeyEvent {
    pub const fn new(key: Key, state: KeyState) -> Self {
        KeyEvent { key, state, value: 0 }
    }

    /// Builds an event with `value` capped at [`MAX_VALUE`] (§8 boundary:
    /// "one above saturates").
    pub fn with_value(key: Key, state: KeyState, value: u16) -> Self {
        KeyEvent { key, state, value: min(value, MAX_VALUE) }
    }

    /// A `Key::TIMEOUT` request for `millis`, saturating at
    /// [`TIMEOUT_REQUEST_MAX_MILLIS`]. The top bit of the 14-bit value field
    /// is always reserved for the `cancel_on_up` flag, so the server loop can
    /// recover both fields from the output event with [`KeyEvent::decode_timeout_request`].
    pub fn timeout_request(millis: u16, cancel_on_up: bool) -> Self {
        let value = min(millis, TIMEOUT_REQUEST_MAX_MILLIS) | if cancel_on_up { 1 << 13 } else { 0 };
        KeyEvent::new(Key::TIMEOUT, KeyState::Down).with_value_raw(value)
    }

    /// Recovers `(millis, cancel_on_up)` from a [`KeyEvent::timeout_request`]
    /// value.
    pub fn decode_timeout_request(value: u16) -> (u16, bool) {
        (value & TIMEOUT_REQUEST_MAX_MILLIS, value & (1 << 13) != 0)
    }

    fn with_value_raw(mut self, value: u16) -> Self {
        self.value = value;
        self
    }

    /// Whether this is a mouse-wheel style event that should get the
    /// zero-value auto-insertion treatment before being buffered.
    pub fn wheel_default_applied(mut self) -> Self {
        if self.value == 0 {
            self.value = DEFAULT_WHEEL_DETENT;
        }
        self
    }
}

impl PartialEq for KeyEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.state.unifies_as_down() == other.state.unifies_as_down()
            && (self.state.unifies_as_down() || self.state == other.state)
    }
}
impl Eq for KeyEvent {}

/// An ordered list of `KeyEvent`. Input expressions, output expressions, and
/// the live sequence buffer all share this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence(pub Vec<KeyEvent>);

impl KeySequence {
    pub fn new() -> Self {
        KeySequence(Vec::new())
    }

    pub fn from_events(events: Vec<KeyEvent>) -> Self {
        KeySequence(events)
    }

    pub fn push(&mut self, event: KeyEvent) {
        self.0.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, KeyEvent> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[KeyEvent] {
        &self.0
    }
}

impl FromIterator<KeyEvent> for KeySequence {
    fn from_iter<T: IntoIterator<Item = KeyEvent>>(iter: T) -> Self {
        KeySequence(iter.into_iter().collect())
    }
}

impl IntoIterator for KeySequence {
    type Item = KeyEvent;
    type IntoIter = alloc::vec::IntoIter<KeyEvent>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
