//! Wire-level errors (§7: "unknown message type or malformed frame" — log,
//! disconnect, never crash).

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtoError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown message type byte {0:#04x}")]
    UnknownMessageType(u8),

    #[error("frame of {0} bytes exceeds the {1}-byte cap")]
    FrameTooLarge(u32, u32),

    #[error("frame ended before its declared length ({0} bytes expected)")]
    TruncatedFrame(usize),

    #[error("string field is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("state kind index {0} does not name a KeyState variant")]
    UnknownStateKind(u8),
}
