// Session lifecycle
// One owned object holds the device stream, the decoded buffer and the single
// source for the whole run. Acquisition happens once, in order; release
// happens exactly once, in reverse, on shutdown.

use std::sync::Arc;

use crate::audio::decoder;
use crate::audio::{AudioOutput, SourceState};
use crate::controller::{Action, PlaybackState};
use crate::diagnostics;
use crate::error::HarnessError;
use crate::settings::HarnessSettings;

pub struct AudioSession {
    output: AudioOutput,
    source: Arc<SourceState>,
}

impl AudioSession {
    /// Acquire everything the interactive loop needs: device stream, device
    /// report, decoded buffer, source, buffer report, initial gain. Any
    /// failure here aborts the harness before the loop starts.
    pub fn open(settings: &HarnessSettings) -> Result<Self, HarnessError> {
        let output = AudioOutput::open(settings.device.as_deref())?;
        diagnostics::write_device_report(&settings.device_report)?;

        let wave = decoder::load_wave(&settings.wave_path)?;
        tracing::info!(
            path = %settings.wave_path.display(),
            frames = wave.frames(),
            sample_rate = wave.sample_rate,
            channels = wave.channels,
            "wave decoded"
        );

        let samples =
            decoder::prepare_for_device(&wave, output.sample_rate(), output.channels() as usize)?;
        let source = Arc::new(SourceState::new(
            samples,
            output.channels() as usize,
            output.sample_rate(),
            settings.looping,
        ));
        output.attach(source.clone());

        diagnostics::write_buffer_report(&settings.buffer_report, &wave)?;

        output.set_master_gain(settings.gain);
        source.set_gain(settings.gain);

        // A stream fault latched while setup was still running is escalated;
        // once the loop starts, faults are only logged.
        if let Some(reason) = output.take_stream_error() {
            return Err(HarnessError::StreamFault { reason });
        }

        Ok(Self { output, source })
    }

    /// The source state as observed right now.
    pub fn playback_state(&self) -> PlaybackState {
        self.source.state()
    }

    /// Issue a controller action against the engine. `SetVolume` is the one
    /// action that makes two calls: master gain, then source gain.
    pub fn apply(&self, action: Action) {
        match action {
            Action::Play => self.source.request_play(),
            Action::Pause => self.source.request_pause(),
            Action::Stop => self.source.request_stop(),
            Action::Rewind => self.source.request_rewind(),
            Action::SetVolume(gain) => {
                self.output.set_master_gain(gain);
                self.source.set_gain(gain);
            }
            // Shutdown is the owner's job; see shutdown().
            Action::Shutdown => {}
        }
    }

    /// Release everything in reverse acquisition order: detach the source
    /// from the callback, drop the source, then drop the stream.
    pub fn shutdown(self) {
        self.output.detach();
        drop(self.source);
        drop(self.output);
        tracing::info!("session released");
    }
}
