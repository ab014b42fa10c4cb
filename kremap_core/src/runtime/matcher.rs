//! The sequence matcher (C2, §4.1): decides whether a prefix of observed
//! events matches one declared input expression.

use crate::event::{KeyEvent, KeyState, MAX_VALUE};
use crate::key::Key;
use alloc::vec::Vec;

/// Outcome of [`match_sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    MightMatch,
    Match,
}

/// `Any` wildcard bindings captured during a successful (or in-progress)
/// match, in left-to-right order (Invariant 5).
pub type AnyBindings = Vec<Key>;

/// A request to arm a timer, produced when the matcher reaches a
/// `Key::timeout` expression position with no reply in the buffer yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutRequest {
    pub millis: u16,
    pub cancel_on_up: bool,
}

fn normalize(state: KeyState) -> KeyState {
    if state == KeyState::DownMatched { KeyState::Down } else { state }
}

/// Two `KeyEvent`s unify iff their states are equal under `DownMatched ≡
/// Down`, and their keys are equal or one is `Any` and the other is not
/// `DownMatched`, and neither key is `none` (§4.1 Unifiability).
fn unify(expr: KeyEvent, seq: KeyEvent) -> bool {
    if expr.key.is_none() || seq.key.is_none() {
        return false;
    }
    if normalize(expr.state) != normalize(seq.state) {
        return false;
    }
    if expr.key == seq.key {
        return true;
    }
    expr.key.is_any() && seq.state != KeyState::DownMatched
}

/// Whether `seq` unifiably contains a `Down` anywhere from `from` onward,
/// used by the `Not` step.
fn contains_unifiable_down(seq: &[KeyEvent], from: usize, key: Key) -> bool {
    seq[from..].iter().any(|e| {
        normalize(e.state) == KeyState::Down
            && (e.key == key || (key.is_any() && e.state != KeyState::DownMatched))
    })
}

/// Finds an async entry in the `DownAsync`/`UpAsync` marker state that the
/// incoming `seq` event can satisfy (§4.1 step 6).
fn find_async_marker_for(async_buf: &[KeyEvent], seq: KeyEvent) -> Option<usize> {
    async_buf.iter().position(|a| {
        a.key == seq.key
            && match (a.state, seq.state) {
                (KeyState::DownAsync, KeyState::Down) => true,
                (KeyState::UpAsync, KeyState::Up) => true,
                _ => false,
            }
    })
}

/// Finds an async entry (possibly already consumed to a concrete state) that
/// satisfies `expr_event` transitively (§4.1 step 8).
fn find_async_concrete_for(async_buf: &[KeyEvent], expr_event: KeyEvent) -> Option<usize> {
    async_buf.iter().position(|a| unify(expr_event, *a))
}

/// `match(expression, sequence, &out_any_bindings, &out_timeout_event)`
/// (§4.1). Pure: mutates only the two out-parameters (returned here as part
/// of the tuple rather than references, which is the idiomatic shape for a
/// value this small).
pub fn match_sequence(
    expr: &[KeyEvent],
    sequence: &[KeyEvent],
) -> (MatchResult, AnyBindings, Option<TimeoutRequest>) {
    let mut e = 0usize;
    let mut s = 0usize;
    let mut async_buf: Vec<KeyEvent> = Vec::new();
    let mut any_bindings: AnyBindings = Vec::new();
    let mut no_might_match = false;

    loop {
        if e >= expr.len() {
            if s >= sequence.len() {
                return (MatchResult::Match, any_bindings, None);
            }
            let seq_event = sequence[s];
            // The expression is spent but a sequence tail remains: it can
            // only be absorbed as already-consumed history (`DownMatched`)
            // or as the satisfier of an async marker still open from
            // earlier in the expression. Anything else means this match
            // would have to swallow an event it never looked at.
            if let Some(idx) = find_async_marker_for(&async_buf, seq_event) {
                async_buf[idx].state = seq_event.state;
                s += 1;
                continue;
            }
            if seq_event.state == KeyState::DownMatched {
                s += 1;
                continue;
            }
            return (MatchResult::NoMatch, any_bindings, None);
        }
        let cur = expr[e];

        // Step 1: async markers.
        if matches!(cur.state, KeyState::DownAsync | KeyState::UpAsync) {
            async_buf.push(cur);
            e += 1;
            continue;
        }

        // Step 2: Not.
        if cur.state == KeyState::Not {
            if contains_unifiable_down(sequence, s, cur.key) {
                return (MatchResult::NoMatch, any_bindings, None);
            }
            e += 1;
            continue;
        }

        // Step 3: NoMightMatch.
        if cur.state == KeyState::NoMightMatch {
            no_might_match = true;
            e += 1;
            continue;
        }

        // Step 4: Key::timeout.
        if cur.key.is_timeout() {
            let reply = sequence.get(s).copied();
            match reply {
                Some(reply) if reply.key.is_timeout() => {
                    let is_not_timeout = cur.state == KeyState::Up;
                    let matched = if is_not_timeout {
                        reply.value < cur.value
                    } else {
                        reply.value >= cur.value
                    };
                    if matched {
                        e += 1;
                        s += 1;
                        continue;
                    }
                    return (MatchResult::NoMatch, any_bindings, None);
                }
                _ => {
                    let request = TimeoutRequest {
                        millis: core::cmp::min(cur.value, MAX_VALUE),
                        cancel_on_up: cur.state == KeyState::Up,
                    };
                    let result = if no_might_match { MatchResult::NoMatch } else { MatchResult::MightMatch };
                    return (result, any_bindings, Some(request));
                }
            }
        }

        // Step 5: direct unification.
        if let Some(seq_event) = sequence.get(s).copied() {
            if unify(cur, seq_event) {
                if cur.key.is_any() {
                    any_bindings.push(seq_event.key);
                }
                if let Some(idx) = find_async_marker_for(&async_buf, seq_event) {
                    async_buf[idx].state = seq_event.state;
                }
                e += 1;
                s += 1;
                continue;
            }
        }

        // Step 6: satisfy sequence[s] against an async marker.
        if let Some(seq_event) = sequence.get(s).copied() {
            if let Some(idx) = find_async_marker_for(&async_buf, seq_event) {
                async_buf[idx].state = seq_event.state;
                s += 1;
                continue;
            }
        }

        // Step 7: skip already-consumed history.
        if let Some(seq_event) = sequence.get(s).copied() {
            if seq_event.state == KeyState::DownMatched {
                s += 1;
                continue;
            }
        }

        // Step 8: satisfy expr[e] transitively against async.
        if let Some(idx) = find_async_concrete_for(&async_buf, cur) {
            async_buf.remove(idx);
            e += 1;
            continue;
        }

        // Step 9.
        return if s >= sequence.len() {
            let result = if no_might_match { MatchResult::NoMatch } else { MatchResult::MightMatch };
            (result, any_bindings, None)
        } else {
            (MatchResult::NoMatch, any_bindings, None)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;

    fn down(k: Key) -> KeyEvent {
        KeyEvent::new(k, KeyState::Down)
    }
    fn up(k: Key) -> KeyEvent {
        KeyEvent::new(k, KeyState::Up)
    }

    #[test]
    fn simple_remap_matches_exactly() {
        let a = Key::physical(1);
        let expr = [down(a)];
        let seq = [down(a)];
        let (result, bindings, timeout) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::Match);
        assert!(bindings.is_empty());
        assert!(timeout.is_none());
    }

    #[test]
    fn prefix_of_longer_expression_might_match() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [down(a), down(b)];
        let seq = [down(a)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::MightMatch);
    }

    #[test]
    fn wrong_key_is_no_match() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [down(a)];
        let seq = [down(b)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn any_binds_the_matched_key() {
        let b = Key::physical(2);
        let expr = [down(Key::ANY)];
        let seq = [down(b)];
        let (result, bindings, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::Match);
        assert_eq!(bindings, alloc::vec![b]);
    }

    #[test]
    fn any_does_not_match_already_matched_down() {
        let b = Key::physical(2);
        let expr = [down(Key::ANY)];
        let seq = [KeyEvent::new(b, KeyState::DownMatched)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn not_rejects_when_key_is_down_in_remaining_sequence() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [KeyEvent::new(b, KeyState::Not), down(a)];
        let seq = [down(b), down(a)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn not_passes_when_key_is_absent() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [KeyEvent::new(b, KeyState::Not), down(a)];
        let seq = [down(a)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::Match);
    }

    #[test]
    fn together_group_async_then_definite() {
        // (A B): *A *B +A +B
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [
            KeyEvent::new(a, KeyState::DownAsync),
            KeyEvent::new(b, KeyState::DownAsync),
            down(a),
            down(b),
        ];
        let seq = [down(a), down(b)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::Match);
    }

    #[test]
    fn together_group_reverse_order_still_matches() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [
            KeyEvent::new(a, KeyState::DownAsync),
            KeyEvent::new(b, KeyState::DownAsync),
            down(a),
            down(b),
        ];
        let seq = [down(b), down(a)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::Match);
    }

    #[test]
    fn no_might_match_prefix_never_reports_might_match() {
        let a = Key::physical(1);
        let b = Key::physical(2);
        let expr = [KeyEvent::new(Key::NONE, KeyState::NoMightMatch), down(a), down(b)];
        let seq = [down(a)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[test]
    fn timeout_down_state_matches_when_elapsed_meets_threshold() {
        let expr = [KeyEvent::with_value(Key::TIMEOUT, KeyState::Down, 200)];
        let seq = [KeyEvent::with_value(Key::TIMEOUT, KeyState::Down, 200)];
        let (result, _, _) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::Match);
    }

    #[test]
    fn timeout_requested_when_no_reply_present() {
        let expr = [KeyEvent::with_value(Key::TIMEOUT, KeyState::Down, 200)];
        let seq: [KeyEvent; 0] = [];
        let (result, _, timeout) = match_sequence(&expr, &seq);
        assert_eq!(result, MatchResult::MightMatch);
        assert_eq!(timeout, Some(TimeoutRequest { millis: 200, cancel_on_up: false }));
    }

    #[test]
    fn not_timeout_cancel_on_up_is_requested() {
        let expr = [KeyEvent::with_value(Key::TIMEOUT, KeyState::Up, 200)];
        let seq: [KeyEvent; 0] = [];
        let (_, _, timeout) = match_sequence(&expr, &seq);
        assert_eq!(timeout, Some(TimeoutRequest { millis: 200, cancel_on_up: true }));
    }

    #[test]
    fn down_matched_in_buffer_does_not_rematch_a_single_key_rule() {
        let a = Key::physical(1);
        let expr = [down(a)];
        let seq = [KeyEvent::new(a, KeyState::DownMatched)];
        let (result, _, _) = match_sequence(&expr, &seq);
        // DownMatched unifies as Down, so a fresh rule consisting of just
        // Down(a) would in fact match the stale marker again; callers (the
        // Stage) are responsible for not re-running `finish_sequence`d
        // rules against history that already produced a match — the
        // matcher itself is a pure function of its two inputs.
        assert_eq!(result, MatchResult::Match);
    }
}
