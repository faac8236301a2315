// packages/engine/src/simulation/keyboard.rs
//! Two-key chord protocol
//!
//! | Chord          | Command              |
//! |----------------|----------------------|
//! | Space, 1–9     | Accelerate 10–90%    |
//! | Space, 0       | Accelerate 100%      |
//! | Ctrl + 1–9     | Brake 10–90%         |
//! | Ctrl + 0       | Brake 100%           |
//!
//! Space primes a single acceleration: the next digit is consumed and the
//! chord returns to idle. Control primes braking for as long as it is held,
//! so several digits can be pressed before releasing it.

use crate::simulation::physics::percentage_for_digit;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Control,
    Digit(u8),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(Key),
    Released(Key),
}

/// Command produced by a completed chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Accelerate(u8),
    Brake(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChordState {
    #[default]
    Idle,

    /// Space seen; waiting for one digit
    AccelerationPrimed,

    /// Control is down; every digit brakes until release
    BrakingHeld,
}

/// Chord decoder
#[derive(Debug, Default)]
pub struct ChordDecoder {
    state: ChordState,
}

impl ChordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChordState {
        self.state
    }

    /// Forget any primed modifier
    pub fn reset(&mut self) {
        self.state = ChordState::Idle;
    }

    /// Feed one key event, returning the command it completes, if any
    pub fn feed(&mut self, event: KeyEvent) -> Option<Command> {
        use ChordState::*;

        match (self.state, event) {
            (_, KeyEvent::Released(Key::Control)) => {
                if self.state == BrakingHeld {
                    self.state = Idle;
                }
                None
            }
            (_, KeyEvent::Released(_)) => None,

            (Idle, KeyEvent::Pressed(Key::Space)) => {
                self.state = AccelerationPrimed;
                None
            }
            (Idle | AccelerationPrimed, KeyEvent::Pressed(Key::Control)) => {
                self.state = BrakingHeld;
                None
            }
            (AccelerationPrimed, KeyEvent::Pressed(Key::Digit(digit))) => {
                let percentage = percentage_for_digit(digit)?;
                self.state = Idle;
                Some(Command::Accelerate(percentage))
            }
            (BrakingHeld, KeyEvent::Pressed(Key::Digit(digit))) => {
                percentage_for_digit(digit).map(Command::Brake)
            }
            _ => None,
        }
    }
}

/// Parses the textual key tokens used by the interactive session:
/// `space`, `ctrl`, `^ctrl` (release), `^space` and the digits `0`–`9`
impl FromStr for KeyEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (released, name) = match s.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let key = match name.to_ascii_lowercase().as_str() {
            "space" | " " => Key::Space,
            "ctrl" | "control" => Key::Control,
            digit if digit.len() == 1 && digit.as_bytes()[0].is_ascii_digit() => {
                Key::Digit(digit.as_bytes()[0] - b'0')
            }
            other => return Err(format!("unknown key: {}", other)),
        };

        Ok(if released {
            KeyEvent::Released(key)
        } else {
            KeyEvent::Pressed(key)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: Key) -> KeyEvent {
        KeyEvent::Pressed(key)
    }

    #[test]
    fn test_space_digit_accelerates_once() {
        let mut chord = ChordDecoder::new();
        assert_eq!(chord.feed(press(Key::Space)), None);
        assert_eq!(chord.state(), ChordState::AccelerationPrimed);
        assert_eq!(chord.feed(press(Key::Digit(5))), Some(Command::Accelerate(50)));
        assert_eq!(chord.state(), ChordState::Idle);

        // The digit was consumed, so a second digit does nothing
        assert_eq!(chord.feed(press(Key::Digit(5))), None);
    }

    #[test]
    fn test_zero_means_full_power() {
        let mut chord = ChordDecoder::new();
        chord.feed(press(Key::Space));
        assert_eq!(chord.feed(press(Key::Digit(0))), Some(Command::Accelerate(100)));

        chord.feed(press(Key::Control));
        assert_eq!(chord.feed(press(Key::Digit(0))), Some(Command::Brake(100)));
    }

    #[test]
    fn test_control_persists_until_release() {
        let mut chord = ChordDecoder::new();
        chord.feed(press(Key::Control));
        assert_eq!(chord.feed(press(Key::Digit(3))), Some(Command::Brake(30)));
        assert_eq!(chord.feed(press(Key::Digit(7))), Some(Command::Brake(70)));

        chord.feed(KeyEvent::Released(Key::Control));
        assert_eq!(chord.state(), ChordState::Idle);
        assert_eq!(chord.feed(press(Key::Digit(7))), None);
    }

    #[test]
    fn test_space_ignored_while_control_held() {
        let mut chord = ChordDecoder::new();
        chord.feed(press(Key::Control));
        chord.feed(press(Key::Space));
        assert_eq!(chord.state(), ChordState::BrakingHeld);
        assert_eq!(chord.feed(press(Key::Digit(2))), Some(Command::Brake(20)));
    }

    #[test]
    fn test_control_overrides_primed_space() {
        let mut chord = ChordDecoder::new();
        chord.feed(press(Key::Space));
        chord.feed(press(Key::Control));
        assert_eq!(chord.feed(press(Key::Digit(4))), Some(Command::Brake(40)));
    }

    #[test]
    fn test_other_keys_keep_primed_state() {
        let mut chord = ChordDecoder::new();
        chord.feed(press(Key::Space));
        chord.feed(press(Key::Other));
        chord.feed(KeyEvent::Released(Key::Space));
        assert_eq!(chord.feed(press(Key::Digit(1))), Some(Command::Accelerate(10)));
    }

    #[test]
    fn test_stray_release_is_harmless() {
        let mut chord = ChordDecoder::new();
        chord.feed(press(Key::Space));
        chord.feed(KeyEvent::Released(Key::Control));
        assert_eq!(chord.state(), ChordState::AccelerationPrimed);
    }

    #[test]
    fn test_digit_without_modifier_is_ignored() {
        let mut chord = ChordDecoder::new();
        assert_eq!(chord.feed(press(Key::Digit(9))), None);
        assert_eq!(chord.state(), ChordState::Idle);
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("space".parse(), Ok(KeyEvent::Pressed(Key::Space)));
        assert_eq!("CTRL".parse(), Ok(KeyEvent::Pressed(Key::Control)));
        assert_eq!("^ctrl".parse(), Ok(KeyEvent::Released(Key::Control)));
        assert_eq!("7".parse(), Ok(KeyEvent::Pressed(Key::Digit(7))));
        assert!("f1".parse::<KeyEvent>().is_err());
    }
}
