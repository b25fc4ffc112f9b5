// Playback state controller
// Maps a user command plus the observed source state to a transition log line
// and a request against the audio engine. Pure decisions only: the engine owns
// the state, this module never mutates it.

use std::fmt;

/// The four source states, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Initial = 0,
    Playing = 1,
    Paused = 2,
    Stopped = 3,
}

impl PlaybackState {
    /// Decode a raw state byte. The value is masked into [0, 3] first, so a
    /// corrupted byte maps to *some* state instead of indexing out of range.
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0x3 {
            0 => PlaybackState::Initial,
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PlaybackState::Initial => "Initial",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed user command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Rewind,
    SetVolume(f32),
    Quit,
}

/// The request the controller issues to the engine for a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Play,
    Pause,
    Stop,
    Rewind,
    SetVolume(f32),
    Shutdown,
}

/// One controller decision: an optional transition line for stdout plus the
/// engine request. The request is always issued even when the move is a
/// logical no-op; the engine is idempotent for same-state requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub message: Option<&'static str>,
    pub action: Action,
}

/// Decide what a command does given the state observed just before it.
pub fn decide(command: Command, state: PlaybackState) -> Decision {
    use PlaybackState::*;

    match command {
        Command::Play => Decision {
            message: match state {
                Initial => Some("from Initial to Playing"),
                Stopped => Some("from Stopped to Initial to Playing"),
                // A play request on a paused source is a resume hint, not a
                // forced restart, so nothing definite can be printed.
                Playing | Paused => None,
            },
            action: Action::Play,
        },
        Command::Pause => Decision {
            message: match state {
                Playing => Some("from Playing to Paused"),
                Initial | Paused | Stopped => Some("NOP"),
            },
            action: Action::Pause,
        },
        Command::Stop => Decision {
            message: match state {
                Initial | Stopped => Some("NOP"),
                Playing => Some("from Playing to Stopped"),
                Paused => Some("from Paused to Stopped"),
            },
            action: Action::Stop,
        },
        Command::Rewind => Decision {
            message: match state {
                Initial => Some("NOP"),
                Playing => Some("from Playing to Stopped to Initial"),
                Paused => Some("from Paused to Initial"),
                Stopped => Some("from Stopped to Initial"),
            },
            action: Action::Rewind,
        },
        Command::SetVolume(v) => Decision {
            message: None,
            action: Action::SetVolume(v),
        },
        Command::Quit => Decision {
            message: None,
            action: Action::Shutdown,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackState::*;

    const ALL_STATES: [PlaybackState; 4] = [Initial, Playing, Paused, Stopped];

    #[test]
    fn test_play_table() {
        let expected = [
            (Initial, Some("from Initial to Playing")),
            (Playing, None),
            (Paused, None),
            (Stopped, Some("from Stopped to Initial to Playing")),
        ];
        for (state, message) in expected {
            let d = decide(Command::Play, state);
            assert_eq!(d.message, message, "play from {state}");
            assert_eq!(d.action, Action::Play, "play from {state}");
        }
    }

    #[test]
    fn test_pause_table() {
        for state in ALL_STATES {
            let d = decide(Command::Pause, state);
            assert_eq!(d.action, Action::Pause);
            if state == Playing {
                assert_eq!(d.message, Some("from Playing to Paused"));
            } else {
                // Never a transition arrow when the source is not playing.
                assert_eq!(d.message, Some("NOP"), "pause from {state}");
            }
        }
    }

    #[test]
    fn test_stop_table() {
        let expected = [
            (Initial, Some("NOP")),
            (Playing, Some("from Playing to Stopped")),
            (Paused, Some("from Paused to Stopped")),
            (Stopped, Some("NOP")),
        ];
        for (state, message) in expected {
            let d = decide(Command::Stop, state);
            assert_eq!(d.message, message, "stop from {state}");
            assert_eq!(d.action, Action::Stop, "stop from {state}");
        }
    }

    #[test]
    fn test_rewind_table() {
        let expected = [
            (Initial, Some("NOP")),
            (Playing, Some("from Playing to Stopped to Initial")),
            (Paused, Some("from Paused to Initial")),
            (Stopped, Some("from Stopped to Initial")),
        ];
        for (state, message) in expected {
            let d = decide(Command::Rewind, state);
            assert_eq!(d.message, message, "rewind from {state}");
            assert_eq!(d.action, Action::Rewind, "rewind from {state}");
        }
    }

    #[test]
    fn test_rewind_from_stopped_is_never_a_nop() {
        let d = decide(Command::Rewind, Stopped);
        assert_eq!(d.message, Some("from Stopped to Initial"));
        assert_ne!(d.message, Some("NOP"));
    }

    #[test]
    fn test_volume_and_quit_are_silent() {
        for state in ALL_STATES {
            let d = decide(Command::SetVolume(0.5), state);
            assert_eq!(d.message, None);
            assert_eq!(d.action, Action::SetVolume(0.5));

            let d = decide(Command::Quit, state);
            assert_eq!(d.message, None);
            assert_eq!(d.action, Action::Shutdown);
        }
    }

    #[test]
    fn test_from_raw_maps_known_values() {
        assert_eq!(PlaybackState::from_raw(0), Initial);
        assert_eq!(PlaybackState::from_raw(1), Playing);
        assert_eq!(PlaybackState::from_raw(2), Paused);
        assert_eq!(PlaybackState::from_raw(3), Stopped);
    }

    #[test]
    fn test_from_raw_masks_out_of_range_values() {
        // Any byte must land on one of the four states without panicking.
        for raw in 0..=u8::MAX {
            let state = PlaybackState::from_raw(raw);
            assert_eq!(state.as_raw(), raw & 0x3);
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Initial.to_string(), "Initial");
        assert_eq!(Playing.to_string(), "Playing");
        assert_eq!(Paused.to_string(), "Paused");
        assert_eq!(Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_keypress_scenario() {
        // P, H, S, R from a fresh source walks the expected transitions.
        let mut state = Initial;

        let d = decide(Command::Play, state);
        assert_eq!(d.message, Some("from Initial to Playing"));
        state = Playing;

        let d = decide(Command::Pause, state);
        assert_eq!(d.message, Some("from Playing to Paused"));
        state = Paused;

        let d = decide(Command::Stop, state);
        assert_eq!(d.message, Some("from Paused to Stopped"));
        state = Stopped;

        let d = decide(Command::Rewind, state);
        assert_eq!(d.message, Some("from Stopped to Initial"));

        let d = decide(Command::Quit, Initial);
        assert_eq!(d.action, Action::Shutdown);
        assert_eq!(d.message, None);
    }
}
