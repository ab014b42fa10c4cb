//! Client state (C6, §4.7): tracks the focused window and the loaded
//! configuration, recomputing which contexts should be active and debouncing
//! config-file reload notifications.

use regex::Regex;

use crate::backend::FocusedWindowSource;
use crate::clock::Clock;

/// Ignore a config-change notification arriving within this many ms of the
/// previous one, to tolerate editors that truncate-then-rewrite (§4.7).
pub const CONFIG_RELOAD_DEBOUNCE_MS: u64 = 250;

/// One field of a window filter: verbatim substring or `/regex/` (mirrors
/// `kremap_core::context::DeviceFilter`'s pattern syntax, but window filters
/// aren't part of the wire `configuration` message — they're resolved
/// entirely client-side against the textual config, so they live here
/// rather than in `kremap_core`).
#[derive(Debug, Clone)]
pub enum Pattern {
    Verbatim(String),
    Regex(Regex),
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        if let Some(body) = raw.strip_prefix('/').and_then(|b| b.strip_suffix('/')) {
            Ok(Pattern::Regex(Regex::new(body)?))
        } else {
            Ok(Pattern::Verbatim(raw.to_string()))
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Verbatim(s) => value.contains(s.as_str()),
            Pattern::Regex(re) => re.is_match(value),
        }
    }
}

/// A context's `[class=.., title=.., path=..]` predicate. `None` fields
/// don't constrain the match; a context with every field `None` matches any
/// window.
#[derive(Debug, Clone, Default)]
pub struct WindowFilter {
    pub class: Option<Pattern>,
    pub title: Option<Pattern>,
    pub path: Option<Pattern>,
}

impl WindowFilter {
    fn matches(&self, class: Option<&str>, title: Option<&str>, path: Option<&str>) -> bool {
        Self::field_matches(&self.class, class)
            && Self::field_matches(&self.title, title)
            && Self::field_matches(&self.path, path)
    }

    fn field_matches(pattern: &Option<Pattern>, observed: Option<&str>) -> bool {
        match pattern {
            None => true,
            Some(p) => observed.is_some_and(|v| p.matches(v)),
        }
    }
}

/// Owns `(window_filters, recent_configs placeholder, active_contexts)` for
/// one client connection. `recent_configs` per §4.7 is the reload-debounce
/// timestamp below; the actual configuration payload lives in whatever
/// implements [`crate::config_repo::ConfigRepository`] is wired in by the
/// daemon binary, not here.
pub struct ClientState<C> {
    window_filters: Vec<WindowFilter>,
    active_contexts: Vec<usize>,
    clock: C,
    last_config_change_ms: Option<u64>,
}

impl<C: Clock> ClientState<C> {
    pub fn new(window_filters: Vec<WindowFilter>, clock: C) -> Self {
        ClientState {
            window_filters,
            active_contexts: Vec::new(),
            clock,
            last_config_change_ms: None,
        }
    }

    pub fn active_contexts(&self) -> &[usize] {
        &self.active_contexts
    }

    pub fn set_window_filters(&mut self, window_filters: Vec<WindowFilter>) {
        self.window_filters = window_filters;
        self.active_contexts.clear();
    }

    /// Recomputes which contexts match the currently focused window.
    /// Returns `Some(indices)` only when the result differs from the
    /// previous computation, since the server should only be told about a
    /// change (§4.7: "if the resulting vector differs from the previous
    /// one, send it to the server").
    pub fn on_focus_changed(&mut self, focus: &dyn FocusedWindowSource) -> Option<Vec<usize>> {
        let class = focus.focused_window_class();
        let title = focus.focused_window_title();
        let path = focus.focused_window_path();

        let new_active: Vec<usize> = self
            .window_filters
            .iter()
            .enumerate()
            .filter(|(_, filter)| filter.matches(class.as_deref(), title.as_deref(), path.as_deref()))
            .map(|(index, _)| index)
            .collect();

        if new_active == self.active_contexts {
            None
        } else {
            log::debug!("active contexts changed: {:?} -> {new_active:?}", self.active_contexts);
            self.active_contexts = new_active.clone();
            Some(new_active)
        }
    }

    /// Debounced config-change gate (§4.7). Call once per raw filesystem
    /// change notification; returns whether the caller should actually
    /// reload, or ignore it as truncate-then-rewrite noise.
    pub fn should_reload_config(&mut self) -> bool {
        let now = self.clock.now_ms();
        let should_reload = match self.last_config_change_ms {
            Some(last) => now.saturating_sub(last) >= CONFIG_RELOAD_DEBOUNCE_MS,
            None => true,
        };
        self.last_config_change_ms = Some(now);
        if !should_reload {
            log::debug!("ignoring config change within {CONFIG_RELOAD_DEBOUNCE_MS}ms debounce window");
        }
        should_reload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StaticFocus;
    use crate::clock::VirtualClock;

    fn filter(class: Option<&str>) -> WindowFilter {
        WindowFilter {
            class: class.map(|c| Pattern::Verbatim(c.to_string())),
            title: None,
            path: None,
        }
    }

    #[test]
    fn recomputes_active_contexts_on_focus_change() {
        let filters = vec![filter(Some("firefox")), filter(Some("alacritty"))];
        let mut state = ClientState::new(filters, VirtualClock::new());

        let focus = StaticFocus { class: Some("firefox-esr".into()), title: None, path: None };
        let result = state.on_focus_changed(&focus);
        assert_eq!(result, Some(vec![0]));
        assert_eq!(state.active_contexts(), &[0]);
    }

    #[test]
    fn returns_none_when_active_set_is_unchanged() {
        let filters = vec![filter(Some("firefox"))];
        let mut state = ClientState::new(filters, VirtualClock::new());
        let focus = StaticFocus { class: Some("firefox".into()), title: None, path: None };

        assert_eq!(state.on_focus_changed(&focus), Some(vec![0]));
        assert_eq!(state.on_focus_changed(&focus), None);
    }

    #[test]
    fn regex_pattern_matches_window_title() {
        let mut filters = vec![WindowFilter::default()];
        filters[0].title = Some(Pattern::parse("/^Mozilla Firefox/").unwrap());
        let mut state = ClientState::new(filters, VirtualClock::new());

        let focus = StaticFocus { class: None, title: Some("Mozilla Firefox - example.com".into()), path: None };
        assert_eq!(state.on_focus_changed(&focus), Some(vec![0]));
    }

    #[test]
    fn config_reload_debounces_rapid_successive_changes() {
        let mut state = ClientState::new(Vec::new(), VirtualClock::new());
        assert!(state.should_reload_config(), "first change always reloads");
        assert!(!state.should_reload_config(), "immediate second change is debounced");

        state.clock.advance(CONFIG_RELOAD_DEBOUNCE_MS);
        assert!(state.should_reload_config(), "change after the debounce window reloads");
    }
}
