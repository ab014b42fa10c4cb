//! Layered error types for the runtime, mirroring the daemon's
//! `PlatformError`/`SerializationError`/... → `DaemonError` composition.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatformError {
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),

    #[error("device operation failed: {0}")]
    DeviceError(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigLoadError {
    #[error("i/o error reading rule set: {0}")]
    Io(#[from] io::Error),

    #[error("rule set failed to validate: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("config load error: {0}")]
    ConfigLoad(#[from] ConfigLoadError),

    #[error("stage index {0} is out of range")]
    StageIndexOutOfRange(usize),
}
