//! Message type tags and typed bodies (§6).

use kremap_core::{Context, Directive, KeySequence, Rule};

use crate::error::ProtoError;
use crate::key_seq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Configuration = 0,
    ActiveContexts = 1,
    ValidateState = 2,
    GetVirtualKeyState = 3,
    SetVirtualKeyState = 4,
    RequestVirtualKeyToggleNotification = 5,
    SetConfigFile = 6,
    SetInstanceId = 7,
    TriggeredAction = 8,
    VirtualKeyState = 9,
    DeviceNames = 10,
}

impl MessageType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self, ProtoError> {
        Ok(match byte {
            0 => Self::Configuration,
            1 => Self::ActiveContexts,
            2 => Self::ValidateState,
            3 => Self::GetVirtualKeyState,
            4 => Self::SetVirtualKeyState,
            5 => Self::RequestVirtualKeyToggleNotification,
            6 => Self::SetConfigFile,
            7 => Self::SetInstanceId,
            8 => Self::TriggeredAction,
            9 => Self::VirtualKeyState,
            10 => Self::DeviceNames,
            other => {
                log::warn!("unknown message type byte {other}, disconnecting peer per the wire protocol's error rule");
                return Err(ProtoError::UnknownMessageType(other));
            }
        })
    }
}

/// One `configuration` message's context, as laid out on the wire.
pub struct WireContext {
    pub inputs: Vec<(KeySequence, i32)>,
    pub outputs: Vec<KeySequence>,
    pub command_outputs: Vec<(KeySequence, i32)>,
    pub device_filter: String,
    pub modifier_filter: KeySequence,
}

pub fn encode_configuration(contexts: &[WireContext], out: &mut Vec<u8>) {
    out.extend_from_slice(&(contexts.len() as u32).to_le_bytes());
    for ctx in contexts {
        out.extend_from_slice(&(ctx.inputs.len() as u32).to_le_bytes());
        for (seq, output_index) in &ctx.inputs {
            key_seq::encode(seq, out);
            out.extend_from_slice(&output_index.to_le_bytes());
        }
        out.extend_from_slice(&(ctx.outputs.len() as u32).to_le_bytes());
        for seq in &ctx.outputs {
            key_seq::encode(seq, out);
        }
        out.extend_from_slice(&(ctx.command_outputs.len() as u32).to_le_bytes());
        for (seq, index) in &ctx.command_outputs {
            key_seq::encode(seq, out);
            out.extend_from_slice(&index.to_le_bytes());
        }
        let filter_bytes = ctx.device_filter.as_bytes();
        out.extend_from_slice(&(filter_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(filter_bytes);
        key_seq::encode(&ctx.modifier_filter, out);
    }
}

pub fn decode_configuration(bytes: &[u8]) -> Result<Vec<WireContext>, ProtoError> {
    let mut cursor = 0usize;
    let ncontexts = key_seq::read_u32(bytes, &mut cursor)? as usize;
    let mut contexts = Vec::with_capacity(ncontexts);
    for _ in 0..ncontexts {
        let ninputs = key_seq::read_u32(bytes, &mut cursor)? as usize;
        let mut inputs = Vec::with_capacity(ninputs);
        for _ in 0..ninputs {
            let seq = key_seq::decode(bytes, &mut cursor)?;
            let output_index = key_seq::read_i32(bytes, &mut cursor)?;
            inputs.push((seq, output_index));
        }

        let noutputs = key_seq::read_u32(bytes, &mut cursor)? as usize;
        let mut outputs = Vec::with_capacity(noutputs);
        for _ in 0..noutputs {
            outputs.push(key_seq::decode(bytes, &mut cursor)?);
        }

        let ncmd = key_seq::read_u32(bytes, &mut cursor)? as usize;
        let mut command_outputs = Vec::with_capacity(ncmd);
        for _ in 0..ncmd {
            let seq = key_seq::decode(bytes, &mut cursor)?;
            let index = key_seq::read_i32(bytes, &mut cursor)?;
            command_outputs.push((seq, index));
        }

        let ndev = key_seq::read_u32(bytes, &mut cursor)? as usize;
        let filter_bytes = bytes.get(cursor..cursor + ndev).ok_or(ProtoError::TruncatedFrame(cursor + ndev))?;
        let device_filter = String::from_utf8(filter_bytes.to_vec())?;
        cursor += ndev;

        let modifier_filter = key_seq::decode(bytes, &mut cursor)?;

        contexts.push(WireContext { inputs, outputs, command_outputs, device_filter, modifier_filter });
    }
    Ok(contexts)
}

/// Builds the compiled [`Context`]s a `kremap_core::domain::RuleSetAggregate`
/// consumes from the wire representation (device filters are compiled by
/// the caller, once per attach, per §4.3).
pub fn wire_contexts_to_core(wire: Vec<WireContext>, directive: &Directive) -> Vec<Context> {
    let _ = directive;
    wire.into_iter()
        .map(|w| {
            let mut ctx = Context::new();
            ctx.outputs = w.outputs;
            ctx.command_outputs = w.command_outputs;
            ctx.device_filter.pattern = w.device_filter;
            ctx.modifier_filter = w.modifier_filter;
            ctx.inputs = w
                .inputs
                .into_iter()
                .map(|(expression, output_index)| Rule { expression, output_index })
                .collect();
            ctx
        })
        .collect()
}

pub fn encode_active_contexts(indices: &[u32], out: &mut Vec<u8>) {
    out.extend_from_slice(&(indices.len() as u32).to_le_bytes());
    for &index in indices {
        out.extend_from_slice(&index.to_le_bytes());
    }
}

pub fn decode_active_contexts(bytes: &[u8]) -> Result<Vec<u32>, ProtoError> {
    let mut cursor = 0usize;
    let n = key_seq::read_u32(bytes, &mut cursor)? as usize;
    let mut indices = Vec::with_capacity(n);
    for _ in 0..n {
        indices.push(key_seq::read_u32(bytes, &mut cursor)?);
    }
    Ok(indices)
}

/// `action_index` occupies the low 18 bits, leaving room for a 14-bit
/// `value` (§6: "may carry a 14-bit value in the upper bits") in the high
/// bits of the `u32` body.
const ACTION_INDEX_BITS: u32 = 18;
const ACTION_INDEX_MASK: u32 = (1 << ACTION_INDEX_BITS) - 1;

pub fn encode_triggered_action(action_index: u32, value: u16, out: &mut Vec<u8>) {
    let packed = (action_index & ACTION_INDEX_MASK) | ((value as u32) << ACTION_INDEX_BITS);
    out.extend_from_slice(&packed.to_le_bytes());
}

pub fn decode_triggered_action(bytes: &[u8]) -> Result<(u32, u16), ProtoError> {
    let mut cursor = 0usize;
    let packed = key_seq::read_u32(bytes, &mut cursor)?;
    Ok((packed & ACTION_INDEX_MASK, (packed >> ACTION_INDEX_BITS) as u16))
}

pub fn encode_device_names(names: &[String], out: &mut Vec<u8>) {
    out.extend_from_slice(&(names.len() as u32).to_le_bytes());
    for name in names {
        let bytes = name.as_bytes();
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
    }
}

pub fn decode_device_names(bytes: &[u8]) -> Result<Vec<String>, ProtoError> {
    let mut cursor = 0usize;
    let n = key_seq::read_u32(bytes, &mut cursor)? as usize;
    let mut names = Vec::with_capacity(n);
    for _ in 0..n {
        let len = key_seq::read_u32(bytes, &mut cursor)? as usize;
        let slice = bytes.get(cursor..cursor + len).ok_or(ProtoError::TruncatedFrame(cursor + len))?;
        names.push(String::from_utf8(slice.to_vec())?);
        cursor += len;
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kremap_core::{Key, KeyEvent, KeyState};

    #[test]
    fn configuration_round_trips() {
        let ctx = WireContext {
            inputs: vec![(KeySequence::from_events(vec![KeyEvent::new(Key::physical(1), KeyState::Down)]), 0)],
            outputs: vec![KeySequence::from_events(vec![KeyEvent::new(Key::physical(2), KeyState::Down)])],
            command_outputs: vec![],
            device_filter: "Keyboard A".into(),
            modifier_filter: KeySequence::new(),
        };
        let mut bytes = Vec::new();
        encode_configuration(&[ctx], &mut bytes);
        let decoded = decode_configuration(&bytes).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].device_filter, "Keyboard A");
        assert_eq!(decoded[0].inputs.len(), 1);
    }

    #[test]
    fn triggered_action_carries_a_value_in_the_upper_bits() {
        let mut bytes = Vec::new();
        encode_triggered_action(7, 500, &mut bytes);
        let (index, value) = decode_triggered_action(&bytes).unwrap();
        assert_eq!(index, 7);
        assert_eq!(value, 500);
    }

    #[test]
    fn device_names_round_trip() {
        let mut bytes = Vec::new();
        encode_device_names(&["Keyboard A".into(), "Mouse B".into()], &mut bytes);
        let names = decode_device_names(&bytes).unwrap();
        assert_eq!(names, vec!["Keyboard A".to_string(), "Mouse B".to_string()]);
    }
}
