//! OS-backend seams (§9 Design Notes: "one enum of backends behind a small
//! trait with a fixed method set"). No concrete evdev/uinput/X11
//! implementation lives here — only the trait boundary and a deterministic
//! in-memory backend used by tests and `kremap_sim`.

use kremap_core::KeyEvent;

/// A per-OS device descriptor. The core/runtime never interprets the
/// `Connected` payload; it only passes it back to the OS layer. `Unavailable`
/// lets device enumeration failures degrade a context's filter to "does not
/// match" instead of panicking (§12).
#[derive(Debug, Clone)]
pub enum DeviceDescriptor {
    Connected { name: String, id: u64 },
    Unavailable(String),
}

impl DeviceDescriptor {
    pub fn name(&self) -> Option<&str> {
        match self {
            DeviceDescriptor::Connected { name, .. } => Some(name.as_str()),
            DeviceDescriptor::Unavailable(_) => None,
        }
    }
}

/// Sends resolved output events to the OS's virtual input device.
pub trait VirtualOutput {
    /// Sends one event. Returns `false` on a per-OS send failure (§7:
    /// "partial failure... halts the send-buffer flush for the current tick
    /// and reschedules"), never an error — the caller decides how to react.
    fn send_key_event(&mut self, event: KeyEvent) -> bool;

    /// Commits buffered events to the OS (a no-op for backends with no
    /// internal buffering).
    fn flush(&mut self) -> bool;

    /// Releases any OS-level resources. Called on exit-gesture shutdown.
    fn shutdown(&mut self);
}

/// Reports which window currently has input focus, for client-side context
/// filtering (§4.7).
pub trait FocusedWindowSource {
    fn focused_window_class(&self) -> Option<String>;
    fn focused_window_title(&self) -> Option<String>;
    fn focused_window_path(&self) -> Option<String>;
}

/// A [`VirtualOutput`] that records everything sent to it instead of
/// touching a real device, for scenario tests and `kremap_sim`.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    sent: Vec<KeyEvent>,
    flush_count: usize,
    shut_down: bool,
    fail_next_send: bool,
}

impl RecordingOutput {
    pub fn new() -> Self {
        RecordingOutput::default()
    }

    pub fn sent(&self) -> &[KeyEvent] {
        &self.sent
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Makes the next `send_key_event` call report failure, for exercising
    /// the §7 partial-failure halt-and-reschedule path.
    pub fn fail_next_send(&mut self) {
        self.fail_next_send = true;
    }
}

impl VirtualOutput for RecordingOutput {
    fn send_key_event(&mut self, event: KeyEvent) -> bool {
        if self.fail_next_send {
            self.fail_next_send = false;
            return false;
        }
        self.sent.push(event);
        true
    }

    fn flush(&mut self) -> bool {
        self.flush_count += 1;
        true
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

/// A stationary [`FocusedWindowSource`] for tests that don't exercise
/// window-context switching.
#[derive(Debug, Clone, Default)]
pub struct StaticFocus {
    pub class: Option<String>,
    pub title: Option<String>,
    pub path: Option<String>,
}

impl FocusedWindowSource for StaticFocus {
    fn focused_window_class(&self) -> Option<String> {
        self.class.clone()
    }
    fn focused_window_title(&self) -> Option<String> {
        self.title.clone()
    }
    fn focused_window_path(&self) -> Option<String> {
        self.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kremap_core::{Key, KeyState};

    #[test]
    fn recording_output_reports_one_forced_failure() {
        let mut output = RecordingOutput::new();
        output.fail_next_send();
        assert!(!output.send_key_event(KeyEvent::new(Key::physical(1), KeyState::Down)));
        assert!(output.send_key_event(KeyEvent::new(Key::physical(1), KeyState::Up)));
        assert_eq!(output.sent().len(), 1);
    }

    #[test]
    fn unavailable_device_has_no_name() {
        let desc = DeviceDescriptor::Unavailable("enumeration failed".into());
        assert_eq!(desc.name(), None);
    }
}
