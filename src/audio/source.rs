// The single playback source
// Owns the decoded payload, the playback cursor and the four-state playback
// state. Transition requests come from the controller; the state itself is
// only ever mutated here and by the output callback (end-of-buffer stop).

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::controller::PlaybackState;

pub struct SourceState {
    // Interleaved f32 at the device's rate and channel layout.
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    state: AtomicU8,
    cursor: AtomicUsize,
    looping: AtomicBool,
    gain: Mutex<f32>,
}

impl SourceState {
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: u32, looping: bool) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            state: AtomicU8::new(PlaybackState::Initial.as_raw()),
            cursor: AtomicUsize::new(0),
            looping: AtomicBool::new(looping),
            gain: Mutex::new(1.0),
        }
    }

    /// Current playback state, as the controller observes it.
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_raw(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.store(state.as_raw(), Ordering::SeqCst);
    }

    /// Start or resume playback. Resuming from a pause keeps the cursor; a
    /// play on an already-playing source changes nothing.
    pub fn request_play(&self) {
        match self.state() {
            PlaybackState::Playing => {}
            PlaybackState::Paused => self.set_state(PlaybackState::Playing),
            PlaybackState::Initial | PlaybackState::Stopped => {
                self.cursor.store(0, Ordering::SeqCst);
                self.set_state(PlaybackState::Playing);
            }
        }
    }

    /// Hold playback at the current cursor. Only a playing source pauses.
    pub fn request_pause(&self) {
        if self.state() == PlaybackState::Playing {
            self.set_state(PlaybackState::Paused);
        }
    }

    /// Stop playback. Initial and Stopped sources are left as they are.
    pub fn request_stop(&self) {
        match self.state() {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.set_state(PlaybackState::Stopped);
            }
            PlaybackState::Initial | PlaybackState::Stopped => {}
        }
    }

    /// Return to the start of the buffer in the Initial state.
    pub fn request_rewind(&self) {
        self.cursor.store(0, Ordering::SeqCst);
        self.set_state(PlaybackState::Initial);
    }

    /// Set the source gain, clamped to the documented [0.0, 1.0] range.
    pub fn set_gain(&self, gain: f32) {
        *self.gain.lock() = gain.clamp(0.0, 1.0);
    }

    pub fn gain(&self) -> f32 {
        *self.gain.lock()
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::SeqCst);
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Fill `out` with the next block of samples, scaled by the source gain
    /// times `master_gain`. Writes silence unless the source is playing.
    /// Reaching the end of the payload wraps when looping, otherwise stops
    /// the source and resets the cursor for the next play.
    pub fn mix_into(&self, out: &mut [f32], master_gain: f32) {
        out.fill(0.0);
        if self.state() != PlaybackState::Playing {
            return;
        }

        let gain = *self.gain.lock() * master_gain;
        let mut cursor = self.cursor.load(Ordering::SeqCst);
        let mut written = 0;

        while written < out.len() {
            if cursor >= self.samples.len() {
                if self.looping() && !self.samples.is_empty() {
                    cursor = 0;
                } else {
                    self.set_state(PlaybackState::Stopped);
                    cursor = 0;
                    break;
                }
            }
            let n = (out.len() - written).min(self.samples.len() - cursor);
            for i in 0..n {
                out[written + i] = self.samples[cursor + i] * gain;
            }
            written += n;
            cursor += n;
        }

        self.cursor.store(cursor, Ordering::SeqCst);
    }
}
