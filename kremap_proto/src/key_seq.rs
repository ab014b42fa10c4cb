//! `key_seq` wire encoding (§6): `u32 size` then `size × { u16 key, u16
//! packed_state_and_value }`.
//!
//! spec.md's literal "low 2 bits encode the state kind index" can't fit
//! `KeyState`'s 8 variants; `SPEC_FULL.md` §13.3 resolves this by widening
//! the index field to the low 4 bits (room for 16) and capping the value
//! that rides in the high 12 bits at `2^12 - 1`. This only affects what fits
//! over the wire — the in-process `KeyEvent::value` cap (14 bits) is
//! untouched.

use kremap_core::{Key, KeyEvent, KeySequence, KeyState};

use crate::error::ProtoError;

const STATE_KIND_BITS: u32 = 4;
const STATE_KIND_MASK: u16 = (1 << STATE_KIND_BITS) - 1;
pub const WIRE_MAX_VALUE: u16 = (1 << (16 - STATE_KIND_BITS)) - 1;

fn state_kind_index(state: KeyState) -> u16 {
    match state {
        KeyState::Down => 0,
        KeyState::Up => 1,
        KeyState::Not => 2,
        KeyState::DownAsync => 3,
        KeyState::UpAsync => 4,
        KeyState::DownMatched => 5,
        KeyState::OutputOnRelease => 6,
        KeyState::NoMightMatch => 7,
    }
}

fn state_from_index(index: u16) -> Result<KeyState, ProtoError> {
    Ok(match index {
        0 => KeyState::Down,
        1 => KeyState::Up,
        2 => KeyState::Not,
        3 => KeyState::DownAsync,
        4 => KeyState::UpAsync,
        5 => KeyState::DownMatched,
        6 => KeyState::OutputOnRelease,
        7 => KeyState::NoMightMatch,
        other => return Err(ProtoError::UnknownStateKind(other as u8)),
    })
}

fn pack(state: KeyState, value: u16) -> u16 {
    let kind = state_kind_index(state) & STATE_KIND_MASK;
    let clamped_value = value.min(WIRE_MAX_VALUE);
    kind | (clamped_value << STATE_KIND_BITS)
}

fn unpack(packed: u16) -> Result<(KeyState, u16), ProtoError> {
    let kind = packed & STATE_KIND_MASK;
    let value = packed >> STATE_KIND_BITS;
    Ok((state_from_index(kind)?, value))
}

pub fn encode(seq: &KeySequence, out: &mut Vec<u8>) {
    out.extend_from_slice(&(seq.len() as u32).to_le_bytes());
    for event in seq.iter() {
        out.extend_from_slice(&event.key.0.to_le_bytes());
        out.extend_from_slice(&pack(event.state, event.value).to_le_bytes());
    }
}

pub fn decode(bytes: &[u8], cursor: &mut usize) -> Result<KeySequence, ProtoError> {
    let size = read_u32(bytes, cursor)? as usize;
    let mut events = Vec::with_capacity(size);
    for _ in 0..size {
        let key = Key(read_u16(bytes, cursor)?);
        let packed = read_u16(bytes, cursor)?;
        let (state, value) = unpack(packed)?;
        events.push(KeyEvent::with_value(key, state, value));
    }
    Ok(KeySequence::from_events(events))
}

pub fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, ProtoError> {
    let slice = bytes.get(*cursor..*cursor + 4).ok_or(ProtoError::TruncatedFrame(*cursor + 4))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(slice.try_into().expect("slice of len 4")))
}

pub fn read_u16(bytes: &[u8], cursor: &mut usize) -> Result<u16, ProtoError> {
    let slice = bytes.get(*cursor..*cursor + 2).ok_or(ProtoError::TruncatedFrame(*cursor + 2))?;
    *cursor += 2;
    Ok(u16::from_le_bytes(slice.try_into().expect("slice of len 2")))
}

pub fn read_i32(bytes: &[u8], cursor: &mut usize) -> Result<i32, ProtoError> {
    read_u32(bytes, cursor).map(|v| v as i32)
}
