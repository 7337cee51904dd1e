//! Per-frame input resolution.
//!
//! The host feeds [`InputState::update`] the set of physical keys that are
//! down this frame. From successive snapshots the state derives press and
//! release edges plus an auto-repeat signal for held keys, and answers
//! queries per [`Action`] (an action is asserted when any of its keys is).
//!
//! Horizontal movement goes through [`DirectionLock`], which decides which of
//! the two direction keys owns repeated movement when both are involved.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crossterm::event::KeyCode;
use log::trace;

use crate::config::RepeatConfig;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Action {
    Rotate,
    SoftDrop,
    MoveLeft,
    MoveRight,
    Pause,
    Confirm,
}

// ============================================================================
// Key bindings
// ============================================================================

#[derive(Clone, Debug)]
pub struct KeyBindings {
    map: HashMap<Action, Vec<KeyCode>>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn bind(mut self, action: Action, keys: &[KeyCode]) -> Self {
        self.map.insert(action, keys.to_vec());
        self
    }

    pub fn keys(&self, action: Action) -> &[KeyCode] {
        self.map.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.map.values().flatten().copied()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::empty()
            .bind(
                Action::Rotate,
                &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')],
            )
            .bind(
                Action::SoftDrop,
                &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')],
            )
            .bind(
                Action::MoveLeft,
                &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')],
            )
            .bind(
                Action::MoveRight,
                &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')],
            )
            .bind(
                Action::Pause,
                &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')],
            )
            .bind(Action::Confirm, &[KeyCode::Enter])
    }
}

// ============================================================================
// Key state
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct KeyState {
    down: bool,
    pressed: bool,
    released: bool,
    repeated: bool,
    until_repeat: Duration,
}

impl KeyState {
    fn advance(&mut self, now_down: bool, dt: Duration, repeat: &RepeatConfig) {
        self.pressed = now_down && !self.down;
        self.released = self.down && !now_down;
        self.repeated = false;

        if self.pressed {
            self.until_repeat = repeat.delay;
        } else if now_down {
            if dt >= self.until_repeat {
                let overshoot = dt - self.until_repeat;
                self.repeated = true;
                self.until_repeat = repeat.interval.saturating_sub(overshoot);
            } else {
                self.until_repeat -= dt;
            }
        }

        self.down = now_down;
    }
}

/// Edge and repeat state for every bound key, refreshed once per frame.
#[derive(Clone, Debug)]
pub struct InputState {
    bindings: KeyBindings,
    repeat: RepeatConfig,
    keys: HashMap<KeyCode, KeyState>,
}

impl InputState {
    pub fn new(bindings: KeyBindings, repeat: RepeatConfig) -> Self {
        let keys = bindings
            .all_keys()
            .map(|key| (key, KeyState::default()))
            .collect();
        Self {
            bindings,
            repeat,
            keys,
        }
    }

    /// Takes the snapshot of keys currently down and the time since the
    /// previous snapshot. Unbound keys are ignored.
    pub fn update(&mut self, down: &HashSet<KeyCode>, dt: Duration) {
        let repeat = self.repeat;
        for (key, state) in self.keys.iter_mut() {
            state.advance(down.contains(key), dt, &repeat);
        }
    }

    pub fn is_down(&self, action: Action) -> bool {
        self.check(action, |s| s.down)
    }

    pub fn was_pressed(&self, action: Action) -> bool {
        self.check(action, |s| s.pressed)
    }

    pub fn was_released(&self, action: Action) -> bool {
        self.check(action, |s| s.released)
    }

    /// Auto-repeat fired this frame for a held key. Never true on the
    /// frame the key went down.
    pub fn was_repeated(&self, action: Action) -> bool {
        self.check(action, |s| s.repeated)
    }

    pub fn horizontal(&self) -> Horizontal {
        Horizontal {
            left_down: self.is_down(Action::MoveLeft),
            left_pressed: self.was_pressed(Action::MoveLeft),
            left_repeated: self.was_repeated(Action::MoveLeft),
            right_down: self.is_down(Action::MoveRight),
            right_pressed: self.was_pressed(Action::MoveRight),
            right_repeated: self.was_repeated(Action::MoveRight),
        }
    }

    fn check(&self, action: Action, predicate: impl Fn(&KeyState) -> bool) -> bool {
        self.bindings
            .keys(action)
            .iter()
            .any(|key| self.keys.get(key).is_some_and(&predicate))
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(KeyBindings::default(), RepeatConfig::default())
    }
}

// ============================================================================
// Direction lock
// ============================================================================

/// The horizontal part of one frame's input.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Horizontal {
    pub left_down: bool,
    pub left_pressed: bool,
    pub left_repeated: bool,
    pub right_down: bool,
    pub right_pressed: bool,
    pub right_repeated: bool,
}

/// Which direction key, if any, owns repeated movement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DirectionLock {
    #[default]
    Unlocked,
    Left,
    Right,
}

impl DirectionLock {
    /// A repeating key claims an unowned lock. Left wins a tie.
    pub fn engage(self, input: &Horizontal) -> Self {
        match self {
            DirectionLock::Unlocked if input.left_repeated => DirectionLock::Left,
            DirectionLock::Unlocked if input.right_repeated => DirectionLock::Right,
            other => other,
        }
    }

    /// Drops the lock once its key is up, handing it straight to the other
    /// key if that one is held and repeating.
    pub fn release(self, input: &Horizontal) -> Self {
        match self {
            DirectionLock::Left if !input.left_down => {
                if input.right_down && input.right_repeated {
                    DirectionLock::Right
                } else {
                    DirectionLock::Unlocked
                }
            }
            DirectionLock::Right if !input.right_down => {
                if input.left_down && input.left_repeated {
                    DirectionLock::Left
                } else {
                    DirectionLock::Unlocked
                }
            }
            other => other,
        }
    }

    /// Runs one frame through the lock and returns the column step to take:
    /// -1, 0 or 1.
    pub fn resolve(&mut self, input: &Horizontal) -> i32 {
        let mut move_left = input.left_pressed || input.left_repeated;
        let mut move_right = input.right_pressed || input.right_repeated;

        let next = self.engage(input).release(input);
        if next != *self {
            trace!("direction lock {:?} -> {:?}", self, next);
            *self = next;
        }

        match self {
            DirectionLock::Left => move_right = false,
            DirectionLock::Right => move_left = false,
            DirectionLock::Unlocked => {
                if move_left && move_right {
                    move_left = false;
                    move_right = false;
                }
            }
        }

        match (move_left, move_right) {
            (true, _) => -1,
            (_, true) => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(codes: &[KeyCode]) -> HashSet<KeyCode> {
        codes.iter().copied().collect()
    }

    fn repeat() -> RepeatConfig {
        RepeatConfig {
            delay: Duration::from_millis(100),
            interval: Duration::from_millis(50),
        }
    }

    mod edges {
        use super::*;

        #[test]
        fn press_and_release_last_one_frame() {
            let mut input = InputState::new(KeyBindings::default(), repeat());
            let frame = Duration::from_millis(16);

            input.update(&keys(&[KeyCode::Left]), frame);
            assert!(input.was_pressed(Action::MoveLeft));
            assert!(input.is_down(Action::MoveLeft));

            input.update(&keys(&[KeyCode::Left]), frame);
            assert!(!input.was_pressed(Action::MoveLeft));
            assert!(input.is_down(Action::MoveLeft));

            input.update(&keys(&[]), frame);
            assert!(input.was_released(Action::MoveLeft));
            assert!(!input.is_down(Action::MoveLeft));

            input.update(&keys(&[]), frame);
            assert!(!input.was_released(Action::MoveLeft));
        }

        #[test]
        fn any_bound_key_asserts_the_action() {
            let mut input = InputState::default();
            input.update(&keys(&[KeyCode::Char('d')]), Duration::ZERO);
            assert!(input.was_pressed(Action::MoveRight));
            assert!(!input.was_pressed(Action::MoveLeft));
        }

        #[test]
        fn unbound_keys_are_ignored() {
            let mut input = InputState::default();
            input.update(&keys(&[KeyCode::Char('z')]), Duration::ZERO);
            for action in [
                Action::Rotate,
                Action::SoftDrop,
                Action::MoveLeft,
                Action::MoveRight,
                Action::Pause,
                Action::Confirm,
            ] {
                assert!(!input.is_down(action));
            }
        }
    }

    mod auto_repeat {
        use super::*;

        #[test]
        fn repeat_waits_for_delay_then_fires_each_interval() {
            let mut input = InputState::new(KeyBindings::default(), repeat());
            let held = keys(&[KeyCode::Right]);

            input.update(&held, Duration::from_millis(10));
            assert!(!input.was_repeated(Action::MoveRight));

            input.update(&held, Duration::from_millis(60));
            assert!(!input.was_repeated(Action::MoveRight));

            input.update(&held, Duration::from_millis(40));
            assert!(input.was_repeated(Action::MoveRight));

            input.update(&held, Duration::from_millis(30));
            assert!(!input.was_repeated(Action::MoveRight));

            input.update(&held, Duration::from_millis(20));
            assert!(input.was_repeated(Action::MoveRight));
        }

        #[test]
        fn release_resets_repeat() {
            let mut input = InputState::new(KeyBindings::default(), repeat());
            let held = keys(&[KeyCode::Left]);

            input.update(&held, Duration::ZERO);
            input.update(&held, Duration::from_millis(100));
            assert!(input.was_repeated(Action::MoveLeft));

            input.update(&keys(&[]), Duration::from_millis(16));
            input.update(&held, Duration::from_millis(16));
            assert!(!input.was_repeated(Action::MoveLeft));
            input.update(&held, Duration::from_millis(50));
            assert!(!input.was_repeated(Action::MoveLeft));
        }
    }

    mod direction_lock {
        use super::*;

        #[test]
        fn single_tap_moves_without_locking() {
            let mut lock = DirectionLock::Unlocked;
            let step = lock.resolve(&Horizontal {
                left_down: true,
                left_pressed: true,
                ..Horizontal::default()
            });
            assert_eq!(step, -1);
            assert_eq!(lock, DirectionLock::Unlocked);
        }

        #[test]
        fn repeat_engages_lock() {
            let mut lock = DirectionLock::Unlocked;
            let step = lock.resolve(&Horizontal {
                right_down: true,
                right_repeated: true,
                ..Horizontal::default()
            });
            assert_eq!(step, 1);
            assert_eq!(lock, DirectionLock::Right);
        }

        #[test]
        fn simultaneous_taps_cancel() {
            let mut lock = DirectionLock::Unlocked;
            let step = lock.resolve(&Horizontal {
                left_down: true,
                left_pressed: true,
                right_down: true,
                right_pressed: true,
                ..Horizontal::default()
            });
            assert_eq!(step, 0);
            assert_eq!(lock, DirectionLock::Unlocked);
        }

        #[test]
        fn locked_direction_suppresses_opposite() {
            let mut lock = DirectionLock::Left;
            let step = lock.resolve(&Horizontal {
                left_down: true,
                left_repeated: true,
                right_down: true,
                right_pressed: true,
                ..Horizontal::default()
            });
            assert_eq!(step, -1);
            assert_eq!(lock, DirectionLock::Left);
        }

        #[test]
        fn locked_key_held_without_repeat_blocks_opposite_tap() {
            let mut lock = DirectionLock::Left;
            let step = lock.resolve(&Horizontal {
                left_down: true,
                right_down: true,
                right_pressed: true,
                ..Horizontal::default()
            });
            assert_eq!(step, 0);
        }

        #[test]
        fn release_hands_lock_to_repeating_opposite() {
            let mut lock = DirectionLock::Left;
            let step = lock.resolve(&Horizontal {
                right_down: true,
                right_repeated: true,
                ..Horizontal::default()
            });
            assert_eq!(lock, DirectionLock::Right);
            assert_eq!(step, 1);
        }

        #[test]
        fn release_without_opposite_repeat_unlocks() {
            let mut lock = DirectionLock::Right;
            let step = lock.resolve(&Horizontal {
                left_down: true,
                left_pressed: true,
                ..Horizontal::default()
            });
            assert_eq!(lock, DirectionLock::Unlocked);
            assert_eq!(step, -1);
        }

        #[test]
        fn engage_prefers_left_on_tie() {
            let input = Horizontal {
                left_down: true,
                left_repeated: true,
                right_down: true,
                right_repeated: true,
                ..Horizontal::default()
            };
            assert_eq!(DirectionLock::Unlocked.engage(&input), DirectionLock::Left);
        }
    }
}
