//! kremap_runtime - the server loop, client state, and OS-backend trait
//! seams that drive a `kremap_core` engine against a real device and socket.
//! No concrete evdev/uinput/X11 implementation lives here; a daemon binary
//! wires those in against the traits declared in [`backend`].

pub mod backend;
pub mod client;
pub mod clock;
pub mod config_repo;
pub mod error;
pub mod server;

pub use backend::{DeviceDescriptor, FocusedWindowSource, RecordingOutput, StaticFocus, VirtualOutput};
pub use client::{ClientState, Pattern, WindowFilter};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use config_repo::FileConfigRepository;
pub use error::{ConfigLoadError, PlatformError, RuntimeError};
pub use server::ServerLoop;
