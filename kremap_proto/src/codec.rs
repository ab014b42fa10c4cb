//! Frame-level read/write: `u32 length` followed by `length` bytes starting
//! with a one-byte [`MessageType`] (§6).

use std::io::{Read, Write};

use crate::error::ProtoError;
use crate::message::MessageType;

/// Frames above this many bytes are rejected outright rather than trusted to
/// allocate (§7: malformed frames are logged and dropped, never crash).
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

pub fn write_frame<W: Write>(writer: &mut W, message_type: MessageType, body: &[u8]) -> Result<(), ProtoError> {
    let length = 1 + body.len() as u32;
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&[message_type.as_byte()])?;
    writer.write_all(body)?;
    Ok(())
}

/// Reads one frame, returning its message type and body (the type byte is
/// not included in the body).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(MessageType, Vec<u8>), ProtoError> {
    let mut length_bytes = [0u8; 4];
    reader.read_exact(&mut length_bytes)?;
    let length = u32::from_le_bytes(length_bytes);
    if length == 0 {
        return Err(ProtoError::TruncatedFrame(1));
    }
    if length > MAX_FRAME_BYTES {
        log::warn!("dropping oversized frame: {length} bytes (max {MAX_FRAME_BYTES})");
        return Err(ProtoError::FrameTooLarge(length, MAX_FRAME_BYTES));
    }

    let mut frame = vec![0u8; length as usize];
    reader.read_exact(&mut frame).map_err(ProtoError::Io)?;
    let message_type = MessageType::from_byte(frame[0])?;
    Ok((message_type, frame[1..].to_vec()))
}
