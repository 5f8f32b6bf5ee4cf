//! Chord and sequence recognition state machine
//!
//! Pure logic, no OS dependencies: the platform listeners feed normalized
//! key-down/key-up events with timestamps, and the recognizer emits
//! high-level hotkey events. Keeping it free of I/O makes the timing and
//! latching behavior directly testable.

use crate::keys::KeyId;
use crate::shortcut::{Chord, ShortcutSpec};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// High-level events raised by the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The toggle shortcut fired.
    Toggle,
    /// The push-to-talk shortcut was pressed.
    HoldStart,
    /// The push-to-talk shortcut was released.
    HoldEnd,
}

/// Per-binding transient recognition state.
///
/// `latched` guards simultaneous chords against auto-repeat and held-key
/// re-fire. `active` is the push-to-talk hold latch, tracked separately so
/// one physical release can never clear two unrelated bindings. Sequential
/// matching arms on full release of the first chord and expires after the
/// window.
#[derive(Debug)]
struct Binding {
    spec: ShortcutSpec,
    latched: bool,
    active: bool,
    first_done: bool,
    armed_at: Option<Instant>,
}

impl Binding {
    fn new(spec: ShortcutSpec) -> Self {
        Self {
            spec,
            latched: false,
            active: false,
            first_done: false,
            armed_at: None,
        }
    }

    /// Evaluate a key-down. Returns true when the binding fires.
    /// `held` already includes the pressed key.
    fn on_key_down(&mut self, held: &HashSet<KeyId>, now: Instant, window: Duration) -> bool {
        match &self.spec {
            ShortcutSpec::Empty => false,
            ShortcutSpec::Simultaneous(keys) => {
                if !self.latched && chord_satisfied(keys, held) {
                    self.latched = true;
                    true
                } else {
                    false
                }
            }
            ShortcutSpec::Sequential { first, second } => {
                if let Some(armed) = self.armed_at {
                    if now.duration_since(armed) <= window {
                        if chord_satisfied(second, held) {
                            // Clear arming so a third chord cannot re-fire
                            // without a fresh first/second pair.
                            self.armed_at = None;
                            self.first_done = false;
                            return true;
                        }
                    } else {
                        // Window expired; this key-down may begin a new
                        // first chord below.
                        self.armed_at = None;
                    }
                }
                if chord_satisfied(first, held) {
                    self.first_done = true;
                }
                false
            }
        }
    }

    /// Evaluate a key-up. `held` no longer contains the released key.
    /// Returns true when a push-to-talk hold should end.
    fn on_key_up(&mut self, key: KeyId, held: &HashSet<KeyId>, now: Instant) -> bool {
        let mut hold_ended = false;
        match &self.spec {
            ShortcutSpec::Empty => {}
            ShortcutSpec::Simultaneous(keys) => {
                if keys.contains(&key) {
                    // Releasing any required key re-enables firing on the
                    // next full chord press.
                    self.latched = false;
                    if self.active {
                        self.active = false;
                        hold_ended = true;
                    }
                }
            }
            ShortcutSpec::Sequential { first, second } => {
                if self.active && second.contains(&key) {
                    self.active = false;
                    hold_ended = true;
                }
                if self.first_done && first.iter().all(|k| !held.contains(k)) {
                    self.armed_at = Some(now);
                    self.first_done = false;
                }
            }
        }
        hold_ended
    }

    fn reset(&mut self) {
        self.latched = false;
        self.active = false;
        self.first_done = false;
        self.armed_at = None;
    }
}

fn chord_satisfied(chord: &Chord, held: &HashSet<KeyId>) -> bool {
    !chord.is_empty() && chord.iter().all(|k| held.contains(k))
}

/// Recognizes the configured toggle and push-to-talk shortcuts from a
/// stream of normalized key events.
#[derive(Debug)]
pub struct Recognizer {
    held: HashSet<KeyId>,
    toggle: Binding,
    ptt: Binding,
    window: Duration,
}

impl Recognizer {
    pub fn new(toggle: ShortcutSpec, ptt: ShortcutSpec, window: Duration) -> Self {
        Self {
            held: HashSet::new(),
            toggle: Binding::new(toggle),
            ptt: Binding::new(ptt),
            window,
        }
    }

    /// Process a key-down event. Auto-repeat downs for a key already held
    /// are ignored.
    pub fn on_key_down(&mut self, key: KeyId, now: Instant) -> Vec<HotkeyEvent> {
        if !self.held.insert(key) {
            return Vec::new();
        }
        let mut events = Vec::new();
        if self.toggle.on_key_down(&self.held, now, self.window) {
            events.push(HotkeyEvent::Toggle);
        }
        if self.ptt.on_key_down(&self.held, now, self.window) && !self.ptt.active {
            self.ptt.active = true;
            events.push(HotkeyEvent::HoldStart);
        }
        events
    }

    /// Process a key-up event.
    pub fn on_key_up(&mut self, key: KeyId, now: Instant) -> Vec<HotkeyEvent> {
        self.held.remove(&key);
        let mut events = Vec::new();
        // Toggle has no hold semantics; this only clears its latch.
        self.toggle.on_key_up(key, &self.held, now);
        if self.ptt.on_key_up(key, &self.held, now) {
            events.push(HotkeyEvent::HoldEnd);
        }
        events
    }

    /// Drop all transient state (held keys, latches, arm timers).
    pub fn reset(&mut self) {
        self.held.clear();
        self.toggle.reset();
        self.ptt.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(400);

    fn recognizer(toggle: &str, ptt: &str) -> Recognizer {
        Recognizer::new(
            ShortcutSpec::parse(toggle),
            ShortcutSpec::parse(ptt),
            WINDOW,
        )
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_combo_fires_once_at_last_key_down() {
        let mut r = recognizer("<ctrl>+<shift>+v", "");
        let t = Instant::now();
        assert!(r.on_key_down(KeyId::Ctrl, t).is_empty());
        assert!(r.on_key_down(KeyId::Shift, t).is_empty());
        assert_eq!(r.on_key_down(KeyId::Char('v'), t), vec![HotkeyEvent::Toggle]);
        // Releasing in any order produces no further events.
        assert!(r.on_key_up(KeyId::Char('v'), t).is_empty());
        assert!(r.on_key_up(KeyId::Shift, t).is_empty());
        assert!(r.on_key_up(KeyId::Ctrl, t).is_empty());
    }

    #[test]
    fn test_combo_latch_blocks_refire_while_held() {
        let mut r = recognizer("<ctrl>+v", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        assert_eq!(r.on_key_down(KeyId::Char('v'), t), vec![HotkeyEvent::Toggle]);
        // v released and re-pressed while ctrl stays held: fires again.
        r.on_key_up(KeyId::Char('v'), t);
        assert_eq!(r.on_key_down(KeyId::Char('v'), t), vec![HotkeyEvent::Toggle]);
    }

    #[test]
    fn test_auto_repeat_down_is_ignored() {
        let mut r = recognizer("<ctrl>+v", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        assert_eq!(r.on_key_down(KeyId::Char('v'), t), vec![HotkeyEvent::Toggle]);
        // Repeat downs without a release: latched, no event.
        assert!(r.on_key_down(KeyId::Char('v'), t).is_empty());
        assert!(r.on_key_down(KeyId::Char('v'), t).is_empty());
    }

    #[test]
    fn test_superset_of_chord_still_fires() {
        // The required set only has to be a subset of the held set.
        let mut r = recognizer("<ctrl>+v", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Shift, t);
        r.on_key_down(KeyId::Ctrl, t);
        assert_eq!(r.on_key_down(KeyId::Char('v'), t), vec![HotkeyEvent::Toggle]);
    }

    #[test]
    fn test_double_tap_within_window_fires() {
        let mut r = recognizer("a,a", "");
        let t = Instant::now();
        assert!(r.on_key_down(KeyId::Char('a'), at(t, 0)).is_empty());
        assert!(r.on_key_up(KeyId::Char('a'), at(t, 50)).is_empty());
        assert_eq!(
            r.on_key_down(KeyId::Char('a'), at(t, 300)),
            vec![HotkeyEvent::Toggle]
        );
        assert!(r.on_key_up(KeyId::Char('a'), at(t, 350)).is_empty());
    }

    #[test]
    fn test_double_tap_outside_window_rearms() {
        let mut r = recognizer("a,a", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Char('a'), at(t, 0));
        r.on_key_up(KeyId::Char('a'), at(t, 50));
        // 600ms > 400ms window: no fire, but this press starts a new pair.
        assert!(r.on_key_down(KeyId::Char('a'), at(t, 600)).is_empty());
        r.on_key_up(KeyId::Char('a'), at(t, 650));
        assert_eq!(
            r.on_key_down(KeyId::Char('a'), at(t, 800)),
            vec![HotkeyEvent::Toggle]
        );
    }

    #[test]
    fn test_triple_tap_fires_once() {
        let mut r = recognizer("a,a", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Char('a'), at(t, 0));
        r.on_key_up(KeyId::Char('a'), at(t, 50));
        assert_eq!(
            r.on_key_down(KeyId::Char('a'), at(t, 150)),
            vec![HotkeyEvent::Toggle]
        );
        r.on_key_up(KeyId::Char('a'), at(t, 200));
        // Third tap pairs with nothing; needs a fourth to fire again.
        assert!(r.on_key_down(KeyId::Char('a'), at(t, 300)).is_empty());
        r.on_key_up(KeyId::Char('a'), at(t, 350));
        assert_eq!(
            r.on_key_down(KeyId::Char('a'), at(t, 450)),
            vec![HotkeyEvent::Toggle]
        );
    }

    #[test]
    fn test_sequential_distinct_chords() {
        let mut r = recognizer("<ctrl>+a,b", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, at(t, 0));
        r.on_key_down(KeyId::Char('a'), at(t, 10));
        // First chord must be fully released before arming.
        r.on_key_up(KeyId::Char('a'), at(t, 60));
        assert!(r.on_key_down(KeyId::Char('b'), at(t, 80)).is_empty());
        r.on_key_up(KeyId::Char('b'), at(t, 90));
        r.on_key_up(KeyId::Ctrl, at(t, 100));
        // Now armed; second chord within the window fires.
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), at(t, 250)),
            vec![HotkeyEvent::Toggle]
        );
    }

    #[test]
    fn test_sequential_fires_on_second_chord_key_down_only() {
        let mut r = recognizer("a,b", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Char('a'), at(t, 0));
        r.on_key_up(KeyId::Char('a'), at(t, 50));
        // A non-matching press mid-window does not fire.
        assert!(r.on_key_down(KeyId::Char('c'), at(t, 100)).is_empty());
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), at(t, 200)),
            vec![HotkeyEvent::Toggle]
        );
    }

    #[test]
    fn test_ptt_hold_start_and_end() {
        let mut r = recognizer("", "<ctrl>+<shift>+b");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        r.on_key_down(KeyId::Shift, t);
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), t),
            vec![HotkeyEvent::HoldStart]
        );
        // Holding produces nothing further.
        assert!(r.on_key_down(KeyId::Char('b'), t).is_empty());
        // Releasing one required key ends the hold exactly once.
        assert_eq!(r.on_key_up(KeyId::Shift, t), vec![HotkeyEvent::HoldEnd]);
        assert!(r.on_key_up(KeyId::Char('b'), t).is_empty());
        assert!(r.on_key_up(KeyId::Ctrl, t).is_empty());
    }

    #[test]
    fn test_ptt_refire_after_release() {
        let mut r = recognizer("", "<ctrl>+b");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), t),
            vec![HotkeyEvent::HoldStart]
        );
        assert_eq!(r.on_key_up(KeyId::Char('b'), t), vec![HotkeyEvent::HoldEnd]);
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), t),
            vec![HotkeyEvent::HoldStart]
        );
    }

    #[test]
    fn test_shared_key_release_does_not_cross_bindings() {
        // Toggle and PTT share <ctrl>; releasing the PTT-only key must not
        // disturb the toggle latch, and vice versa.
        let mut r = recognizer("<ctrl>+v", "<ctrl>+b");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        assert_eq!(r.on_key_down(KeyId::Char('v'), t), vec![HotkeyEvent::Toggle]);
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), t),
            vec![HotkeyEvent::HoldStart]
        );
        // Releasing v clears only the toggle latch.
        assert!(r.on_key_up(KeyId::Char('v'), t).is_empty());
        // PTT hold is still active; releasing b ends it.
        assert_eq!(r.on_key_up(KeyId::Char('b'), t), vec![HotkeyEvent::HoldEnd]);
    }

    #[test]
    fn test_same_spec_for_both_roles_fires_both() {
        let mut r = recognizer("<ctrl>+m", "<ctrl>+m");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        assert_eq!(
            r.on_key_down(KeyId::Char('m'), t),
            vec![HotkeyEvent::Toggle, HotkeyEvent::HoldStart]
        );
        assert_eq!(r.on_key_up(KeyId::Char('m'), t), vec![HotkeyEvent::HoldEnd]);
    }

    #[test]
    fn test_empty_specs_are_inert() {
        let mut r = recognizer("", "");
        let t = Instant::now();
        assert!(r.on_key_down(KeyId::Ctrl, t).is_empty());
        assert!(r.on_key_down(KeyId::Char('v'), t).is_empty());
        assert!(r.on_key_up(KeyId::Char('v'), t).is_empty());
    }

    #[test]
    fn test_sequential_ptt_release_of_second_chord_ends_hold() {
        let mut r = recognizer("", "b,b");
        let t = Instant::now();
        r.on_key_down(KeyId::Char('b'), at(t, 0));
        r.on_key_up(KeyId::Char('b'), at(t, 40));
        assert_eq!(
            r.on_key_down(KeyId::Char('b'), at(t, 120)),
            vec![HotkeyEvent::HoldStart]
        );
        assert_eq!(
            r.on_key_up(KeyId::Char('b'), at(t, 500)),
            vec![HotkeyEvent::HoldEnd]
        );
    }

    #[test]
    fn test_reset_clears_state() {
        let mut r = recognizer("<ctrl>+v", "");
        let t = Instant::now();
        r.on_key_down(KeyId::Ctrl, t);
        r.reset();
        // Ctrl is no longer considered held after reset.
        assert!(r.on_key_down(KeyId::Char('v'), t).is_empty());
    }
}
