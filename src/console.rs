// Interactive console loop
// Single-threaded and blocking: one command runs to completion before the
// next token is read. Commands are single characters, case-insensitive;
// anything else falls through with no action.

use std::io::{self, BufRead, Write};

use crate::controller::{decide, Command};
use crate::session::AudioSession;

const BANNER: &str = "\
waveplay test keys:

P) play the source
H) pause (hold) the source
S) stop the source
R) rewind the source
V) set the gain scale (volume)
Q) release the device and quit
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Play,
    Pause,
    Stop,
    Rewind,
    Volume,
    Quit,
}

fn parse_key(token: &str) -> Option<Key> {
    let mut chars = token.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    match first.to_ascii_uppercase() {
        'P' => Some(Key::Play),
        'H' => Some(Key::Pause),
        'S' => Some(Key::Stop),
        'R' => Some(Key::Rewind),
        'V' => Some(Key::Volume),
        'Q' => Some(Key::Quit),
        _ => None,
    }
}

/// Read commands from stdin until quit or end of input. The caller tears the
/// session down afterwards.
pub fn run(session: &AudioSession) -> io::Result<()> {
    println!("{}", BANNER);

    let stdin = io::stdin();
    let mut awaiting_volume = false;
    for line in stdin.lock().lines() {
        let line = line?;
        for token in line.split_whitespace() {
            if awaiting_volume {
                awaiting_volume = false;
                match token.parse::<f32>() {
                    Ok(gain) => execute(session, Command::SetVolume(gain)),
                    Err(_) => tracing::warn!(token, "not a volume value, ignoring"),
                }
                continue;
            }
            match parse_key(token) {
                Some(Key::Play) => execute(session, Command::Play),
                Some(Key::Pause) => execute(session, Command::Pause),
                Some(Key::Stop) => execute(session, Command::Stop),
                Some(Key::Rewind) => execute(session, Command::Rewind),
                Some(Key::Volume) => awaiting_volume = true,
                Some(Key::Quit) => {
                    execute(session, Command::Quit);
                    return Ok(());
                }
                None => {}
            }
        }
        if awaiting_volume {
            print!("Enter new volume scale: ");
            io::stdout().flush()?;
        }
    }

    // End of input counts as a quit.
    Ok(())
}

fn execute(session: &AudioSession, command: Command) {
    let state = session.playback_state();
    tracing::debug!(state = %state, command = ?command, "handling command");
    let decision = decide(command, state);
    if let Some(message) = decision.message {
        println!("{}", message);
    }
    session.apply(decision.action);
}
