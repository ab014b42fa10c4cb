//! Compiled rule-set data model (§3): `Rule`, `Context`, `Directive`. These
//! are produced by the external configuration parser (out of scope) and
//! consumed by [`crate::stage::Stage`].

use crate::event::{KeyEvent, KeySequence, KeyState};
use crate::key::Key;
use alloc::string::String;
use alloc::vec::Vec;
use fixedbitset::FixedBitSet;

/// `{ expression, output_index }`. Non-negative `output_index` points into
/// the context's direct-output table; negative encodes a command index.
#[derive(Debug, Clone)]
pub struct Rule {
    pub expression: KeySequence,
    pub output_index: i32,
}

/// A filter string against a device name: verbatim, substring, or
/// `/regex/[i]` (§4.3). Regex support requires the `std` feature.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub pattern: String,
    pub invert: bool,
}

#[derive(Debug, Clone)]
enum CompiledPattern {
    MatchAll,
    Verbatim(String),
    Substring(String),
    #[cfg(feature = "std")]
    Regex(regex::Regex),
}

impl DeviceFilter {
    /// Compiles the filter's pattern syntax once, ahead of the hot path
    /// (§4.3: "evaluated once at device-attach").
    pub fn compile(&self) -> Result<CompiledDeviceFilter, crate::error::CoreError> {
        let pattern = self.pattern.trim();
        let compiled = if pattern.is_empty() {
            CompiledPattern::MatchAll
        } else if let Some(body) = pattern.strip_prefix('/') {
            #[cfg(feature = "std")]
            {
                let (body, case_insensitive) = match body.strip_suffix("/i") {
                    Some(b) => (b, true),
                    None => (body.strip_suffix('/').unwrap_or(body), false),
                };
                let re = if case_insensitive {
                    regex::RegexBuilder::new(body).case_insensitive(true).build()
                } else {
                    regex::Regex::new(body)
                }
                .map_err(|e| crate::error::CoreError::InvalidDeviceFilter(alloc::format!("{e}")))?;
                CompiledPattern::Regex(re)
            }
            #[cfg(not(feature = "std"))]
            {
                let _ = body;
                return Err(crate::error::CoreError::InvalidDeviceFilter(alloc::string::String::from(
                    "regex device filters require the `std` feature",
                )));
            }
        } else if pattern.contains('*') {
            CompiledPattern::Substring(pattern.replace('*', ""))
        } else {
            CompiledPattern::Verbatim(pattern.into())
        };
        Ok(CompiledDeviceFilter { compiled, invert: self.invert })
    }
}

/// A device filter ready for the hot path: no parsing left to do.
#[derive(Debug, Clone)]
pub struct CompiledDeviceFilter {
    compiled: CompiledPattern,
    invert: bool,
}

impl CompiledDeviceFilter {
    pub fn matches(&self, device_name: &str) -> bool {
        let raw = match &self.compiled {
            CompiledPattern::MatchAll => true,
            CompiledPattern::Verbatim(s) => s == device_name,
            CompiledPattern::Substring(s) => device_name.contains(s.as_str()),
            #[cfg(feature = "std")]
            CompiledPattern::Regex(re) => re.is_match(device_name),
        };
        raw ^ self.invert
    }
}

/// `{ inputs, outputs, command_outputs, device_filter, modifier_filter,
/// fallthrough }` (§3).
#[derive(Debug, Clone)]
pub struct Context {
    pub inputs: Vec<Rule>,
    pub outputs: Vec<KeySequence>,
    pub command_outputs: Vec<(i32, KeySequence)>,
    pub device_filter: DeviceFilter,
    /// Each entry is a key that must be `Down` (or `Not` ⇒ must be `Up`).
    pub modifier_filter: KeySequence,
    pub invert_modifier_filter: bool,
    pub fallthrough: bool,
}

impl Context {
    pub fn new() -> Self {
        Context {
            inputs: Vec::new(),
            outputs: Vec::new(),
            command_outputs: Vec::new(),
            device_filter: DeviceFilter::default(),
            modifier_filter: KeySequence::new(),
            invert_modifier_filter: false,
            fallthrough: false,
        }
    }

    pub fn has_context_active_input(&self) -> bool {
        self.inputs.iter().any(|r| {
            r.expression.as_slice().iter().any(|e| e.key.is_context_active())
        })
    }

    /// Resolves `output_index` to its `KeySequence`. Non-negative indices are
    /// direct-output lookups; negative indices are command overrides local
    /// to this context. A process-wide default command table (§4.2 step 5's
    /// further fallback below the context-local override) is out of scope
    /// here and belongs to whatever assembles contexts from parsed commands.
    pub fn find_output(&self, output_index: i32) -> Option<&KeySequence> {
        if output_index >= 0 {
            self.outputs.get(output_index as usize)
        } else {
            self.command_outputs
                .iter()
                .find(|(idx, _)| *idx == output_index)
                .map(|(_, seq)| seq)
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

/// Process-wide options (§3 `Directive`).
#[derive(Debug, Clone)]
pub struct Directive {
    pub virtual_keys_toggle: bool,
    /// Physical modifier keys allowed to reach external applications
    /// unaltered while a match is pending (§4.5).
    pub forward_modifiers: FixedBitSet,
    /// `@stage` boundaries: index into a flat context list where each new
    /// stage begins.
    pub stage_boundaries: Vec<usize>,
}

impl Directive {
    pub fn new(key_space: usize) -> Self {
        Directive {
            virtual_keys_toggle: true,
            forward_modifiers: FixedBitSet::with_capacity(key_space),
            stage_boundaries: Vec::new(),
        }
    }

    pub fn forwards(&self, key: Key) -> bool {
        (key.0 as usize) < self.forward_modifiers.len() && self.forward_modifiers[key.0 as usize]
    }
}

/// Whether `modifiers` currently satisfies a context's modifier filter:
/// each `Down` entry must be set, each `Not` entry must be clear, in
/// `current_state` (§4.3).
pub fn modifier_filter_matches(filter: &KeySequence, invert: bool, is_down: impl Fn(Key) -> bool) -> bool {
    let satisfied = filter.as_slice().iter().all(|entry| match entry.state {
        KeyState::Not => !is_down(entry.key),
        _ => is_down(entry.key),
    });
    satisfied != invert
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = DeviceFilter::default();
        let compiled = filter.compile().unwrap();
        assert!(compiled.matches("any device"));
    }

    #[test]
    fn verbatim_filter_requires_exact_match() {
        let filter = DeviceFilter { pattern: "Keyboard A".into(), invert: false };
        let compiled = filter.compile().unwrap();
        assert!(compiled.matches("Keyboard A"));
        assert!(!compiled.matches("Keyboard B"));
    }

    #[test]
    fn invert_flips_the_result() {
        let filter = DeviceFilter { pattern: "Keyboard A".into(), invert: true };
        let compiled = filter.compile().unwrap();
        assert!(!compiled.matches("Keyboard A"));
        assert!(compiled.matches("Keyboard B"));
    }

    #[test]
    fn modifier_filter_requires_down_and_absence_of_not() {
        let shift = Key::physical(1);
        let ctrl = Key::physical(2);
        let mut filter = KeySequence::new();
        filter.push(KeyEvent::new(shift, KeyState::Down));
        filter.push(KeyEvent::new(ctrl, KeyState::Not));

        let down = |k: Key| k == shift;
        assert!(modifier_filter_matches(&filter, false, down));

        let both_down = |_: Key| true;
        assert!(!modifier_filter_matches(&filter, false, both_down));
    }

    #[test]
    fn command_output_falls_back_to_context_override() {
        let mut ctx = Context::new();
        ctx.command_outputs.push((-1, KeySequence::from_events(alloc::vec![KeyEvent::new(Key::physical(9), KeyState::Down)])));
        let found = ctx.find_output(-1).unwrap();
        assert_eq!(found.len(), 1);
        assert!(ctx.find_output(-2).is_none());
    }
}
