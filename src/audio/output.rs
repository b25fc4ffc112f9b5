// Audio output using cpal
// Opens the playback device, runs the output stream, and mixes the attached
// source in the callback. Also owns the master gain (the "listener" side of
// the volume pair) and the sticky stream-error flag.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::source::SourceState;
use crate::error::HarnessError;

type SourceSlot = Arc<Mutex<Option<Arc<SourceState>>>>;

/// Last stream error since the previous check. Reading clears the slot, so
/// an error left unchecked across several calls is attributed to whichever
/// check happens next.
#[derive(Default)]
pub struct StreamErrorFlag(Mutex<Option<String>>);

impl StreamErrorFlag {
    fn latch(&self, reason: String) {
        *self.0.lock() = Some(reason);
    }

    /// Take the latched error, clearing the flag.
    pub fn take(&self) -> Option<String> {
        self.0.lock().take()
    }
}

pub struct AudioOutput {
    _stream: Stream,
    source_slot: SourceSlot,
    master_gain: Arc<Mutex<f32>>,
    error_flag: Arc<StreamErrorFlag>,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

impl AudioOutput {
    /// Open an output device and start its stream. `device_name` selects a
    /// device whose name contains the given string; the default device is
    /// used when it is `None`.
    pub fn open(device_name: Option<&str>) -> Result<Self, HarnessError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(wanted) => host
                .output_devices()
                .map_err(|e| HarnessError::DeviceConfig {
                    reason: e.to_string(),
                })?
                .find(|d| d.name().map(|n| n.contains(wanted)).unwrap_or(false))
                .ok_or_else(|| HarnessError::DeviceNotFound {
                    name: wanted.to_string(),
                })?,
            None => host
                .default_output_device()
                .ok_or(HarnessError::NoOutputDevice)?,
        };
        let resolved_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());

        let config = device
            .default_output_config()
            .map_err(|e| HarnessError::DeviceConfig {
                reason: e.to_string(),
            })?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let source_slot: SourceSlot = Arc::new(Mutex::new(None));
        let master_gain = Arc::new(Mutex::new(1.0f32));
        let error_flag = Arc::new(StreamErrorFlag::default());

        // Build the output stream based on sample format
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config.into(),
                source_slot.clone(),
                master_gain.clone(),
                error_flag.clone(),
            )?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config.into(),
                source_slot.clone(),
                master_gain.clone(),
                error_flag.clone(),
            )?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config.into(),
                source_slot.clone(),
                master_gain.clone(),
                error_flag.clone(),
            )?,
            format => {
                return Err(HarnessError::UnsupportedFormat {
                    format: format!("{:?}", format),
                })
            }
        };

        stream.play().map_err(|e| HarnessError::StreamPlay {
            reason: e.to_string(),
        })?;

        tracing::info!(device = %resolved_name, sample_rate, channels, "output stream started");

        Ok(Self {
            _stream: stream,
            source_slot,
            master_gain,
            error_flag,
            sample_rate,
            channels,
            device_name: resolved_name,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        source_slot: SourceSlot,
        master_gain: Arc<Mutex<f32>>,
        error_flag: Arc<StreamErrorFlag>,
    ) -> Result<Stream, HarnessError> {
        let mut scratch: Vec<f32> = Vec::new();
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    let master = *master_gain.lock();
                    match source_slot.lock().as_ref() {
                        Some(source) => source.mix_into(&mut scratch, master),
                        None => scratch.fill(0.0),
                    }
                    for (out, &value) in data.iter_mut().zip(&scratch) {
                        *out = T::from_sample(value);
                    }
                },
                {
                    let error_flag = error_flag.clone();
                    move |err| {
                        tracing::error!("audio stream error: {}", err);
                        error_flag.latch(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| HarnessError::StreamBuild {
                reason: e.to_string(),
            })?;

        Ok(stream)
    }

    /// Attach the source the callback mixes from.
    pub fn attach(&self, source: Arc<SourceState>) {
        *self.source_slot.lock() = Some(source);
    }

    /// Detach the source; the callback goes back to silence.
    pub fn detach(&self) {
        *self.source_slot.lock() = None;
    }

    /// Set the master gain, clamped to the documented [0.0, 1.0] range.
    pub fn set_master_gain(&self, gain: f32) {
        *self.master_gain.lock() = gain.clamp(0.0, 1.0);
    }

    pub fn master_gain(&self) -> f32 {
        *self.master_gain.lock()
    }

    /// Take the last stream error latched since the previous check, if any.
    pub fn take_stream_error(&self) -> Option<String> {
        self.error_flag.take()
    }

    /// Get the output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of output channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Name of the opened device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
