// Wave loading using Symphonia
// Decodes the test file to interleaved f32 once at startup, then adapts the
// payload to the output device's channel layout and sample rate.

use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};

use crate::error::HarnessError;

/// A fully decoded wave payload, still at the file's own rate and layout.
pub struct DecodedWave {
    /// Interleaved f32 samples.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
    pub bits_per_sample: u32,
}

impl DecodedWave {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Size of the payload as stored in the file, in bytes.
    pub fn byte_len(&self) -> usize {
        self.samples.len() * (self.bits_per_sample as usize).div_ceil(8)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Open and fully decode a wave file.
pub fn load_wave(path: &Path) -> Result<DecodedWave, HarnessError> {
    let file = File::open(path).map_err(|e| HarnessError::WaveOpen {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint using the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| HarnessError::WaveFormat {
            reason: format!("failed to probe file format: {}", e),
        })?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| HarnessError::WaveFormat {
            reason: "no audio track found".to_string(),
        })?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
    let bits_per_sample = track.codec_params.bits_per_sample.unwrap_or(16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| HarnessError::WaveFormat {
            reason: format!("failed to create decoder: {}", e),
        })?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(HarnessError::WaveDecode {
                    reason: format!("failed to read packet: {}", e),
                })
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => samples.extend(audio_buf_to_f32(&decoded)),
            Err(SymphoniaError::DecodeError(e)) => {
                // Skippable; the rest of the payload is still usable
                tracing::warn!("decode error (skipping packet): {}", e);
                continue;
            }
            Err(e) => {
                return Err(HarnessError::WaveDecode {
                    reason: format!("decode failed: {}", e),
                })
            }
        }
    }

    Ok(DecodedWave {
        samples,
        sample_rate,
        channels,
        bits_per_sample,
    })
}

/// Adapt a decoded payload to the output device's layout: map channels, then
/// resample when the rates differ. Runs once at load time so the audio
/// callback only ever copies samples.
pub fn prepare_for_device(
    wave: &DecodedWave,
    device_rate: u32,
    device_channels: usize,
) -> Result<Vec<f32>, HarnessError> {
    let mapped = map_channels(&wave.samples, wave.channels, device_channels);
    if wave.sample_rate == device_rate || mapped.is_empty() || device_channels == 0 {
        return Ok(mapped);
    }
    let planes = deinterleave(&mapped, device_channels);
    let resampled = resample_planes(&planes, wave.sample_rate, device_rate)?;
    Ok(interleave(&resampled))
}

/// Map an interleaved payload from `src` channels to `dst` channels.
/// Downmix to mono averages; upmix repeats the last source channel.
fn map_channels(samples: &[f32], src: usize, dst: usize) -> Vec<f32> {
    if src == dst || src == 0 || dst == 0 {
        return samples.to_vec();
    }
    let frames = samples.len() / src;
    let mut out = Vec::with_capacity(frames * dst);
    if dst == 1 {
        for frame in samples.chunks_exact(src) {
            out.push(frame.iter().sum::<f32>() / src as f32);
        }
    } else {
        for frame in samples.chunks_exact(src) {
            for ch in 0..dst {
                out.push(frame[ch.min(src - 1)]);
            }
        }
    }
    out
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planes
}

fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let channels = planes.len();
    if channels == 0 {
        return Vec::new();
    }
    let frames = planes[0].len();
    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for plane in planes {
            out.push(plane[frame]);
        }
    }
    out
}

fn resample_planes(
    planes: &[Vec<f32>],
    src_rate: u32,
    dst_rate: u32,
) -> Result<Vec<Vec<f32>>, HarnessError> {
    const CHUNK: usize = 1024;

    let channels = planes.len();
    let frames = planes[0].len();
    let mut resampler =
        FftFixedIn::<f32>::new(src_rate as usize, dst_rate as usize, CHUNK, 2, channels)
            .map_err(|e| HarnessError::Resample {
                reason: e.to_string(),
            })?;
    let delay = resampler.output_delay();
    let expected = (frames as u64 * dst_rate as u64 / src_rate as u64) as usize;

    let mut out: Vec<Vec<f32>> = vec![Vec::new(); channels];
    fn append(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
        for (plane, b) in out.iter_mut().zip(block) {
            plane.extend(b);
        }
    }

    let mut pos = 0;
    while frames - pos >= CHUNK {
        let chunk: Vec<&[f32]> = planes.iter().map(|p| &p[pos..pos + CHUNK]).collect();
        let block = resampler
            .process(&chunk, None)
            .map_err(|e| HarnessError::Resample {
                reason: e.to_string(),
            })?;
        append(&mut out, block);
        pos += CHUNK;
    }

    if pos < frames {
        let tail: Vec<&[f32]> = planes.iter().map(|p| &p[pos..]).collect();
        let block = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| HarnessError::Resample {
                reason: e.to_string(),
            })?;
        append(&mut out, block);
    }

    // Drain the resampler's internal latency so the tail is not cut short.
    while out[0].len() < expected + delay {
        let block = resampler
            .process_partial(Option::<&[Vec<f32>]>::None, None)
            .map_err(|e| HarnessError::Resample {
                reason: e.to_string(),
            })?;
        if block[0].is_empty() {
            break;
        }
        append(&mut out, block);
    }

    for plane in out.iter_mut() {
        let skip = delay.min(plane.len());
        plane.drain(..skip);
        plane.truncate(expected);
    }
    Ok(out)
}

/// Convert any AudioBufferRef to interleaved f32 samples
fn audio_buf_to_f32(buf: &AudioBufferRef) -> Vec<f32> {
    match buf {
        AudioBufferRef::F32(b) => interleave_f32(b.planes(), b.frames()),
        AudioBufferRef::F64(b) => interleave_convert(b.planes(), b.frames(), |s: f64| s as f32),
        AudioBufferRef::S8(b) => {
            let scale = 1.0 / 128.0;
            interleave_convert(b.planes(), b.frames(), |s: i8| s as f32 * scale)
        }
        AudioBufferRef::S16(b) => {
            let scale = 1.0 / 32768.0;
            interleave_convert(b.planes(), b.frames(), |s: i16| s as f32 * scale)
        }
        AudioBufferRef::S24(b) => {
            let scale = 1.0 / 8388608.0;
            interleave_convert(b.planes(), b.frames(), |s| s.inner() as f32 * scale)
        }
        AudioBufferRef::S32(b) => {
            let scale = 1.0 / 2147483648.0;
            interleave_convert(b.planes(), b.frames(), |s: i32| s as f32 * scale)
        }
        AudioBufferRef::U8(b) => {
            interleave_convert(b.planes(), b.frames(), |s: u8| (s as f32 - 128.0) / 128.0)
        }
        AudioBufferRef::U16(b) => {
            interleave_convert(b.planes(), b.frames(), |s: u16| {
                (s as f32 - 32768.0) / 32768.0
            })
        }
        AudioBufferRef::U24(b) => {
            interleave_convert(b.planes(), b.frames(), |s| {
                (s.inner() as f32 - 8388608.0) / 8388608.0
            })
        }
        AudioBufferRef::U32(b) => {
            interleave_convert(b.planes(), b.frames(), |s: u32| {
                (s as f64 - 2147483648.0) as f32 / 2147483648.0
            })
        }
    }
}

fn interleave_f32(planes: AudioPlanes<f32>, frames: usize) -> Vec<f32> {
    let num_channels = planes.planes().len();
    if num_channels == 0 || frames == 0 {
        return vec![];
    }

    let mut interleaved = Vec::with_capacity(frames * num_channels);
    for frame in 0..frames {
        for ch in 0..num_channels {
            interleaved.push(planes.planes()[ch][frame]);
        }
    }
    interleaved
}

fn interleave_convert<T: Sample + Copy, F: Fn(T) -> f32>(
    planes: AudioPlanes<T>,
    frames: usize,
    convert: F,
) -> Vec<f32> {
    let num_channels = planes.planes().len();
    if num_channels == 0 || frames == 0 {
        return vec![];
    }

    let mut interleaved = Vec::with_capacity(frames * num_channels);
    for frame in 0..frames {
        for ch in 0..num_channels {
            interleaved.push(convert(planes.planes()[ch][frame]));
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_len_accounts_for_bit_depth() {
        let wave = DecodedWave {
            samples: vec![0.0; 100],
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        };
        assert_eq!(wave.frames(), 50);
        assert_eq!(wave.byte_len(), 200);

        let wave = DecodedWave {
            samples: vec![0.0; 100],
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 24,
        };
        assert_eq!(wave.byte_len(), 300);
    }

    #[test]
    fn test_duration() {
        let wave = DecodedWave {
            samples: vec![0.0; 44100 * 2],
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        };
        assert!((wave.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_map_channels_mono_to_stereo() {
        let mapped = map_channels(&[0.1, 0.2, 0.3], 1, 2);
        assert_eq!(mapped, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_map_channels_stereo_to_mono_averages() {
        let mapped = map_channels(&[0.0, 1.0, 0.5, 0.5], 2, 1);
        assert_eq!(mapped, vec![0.5, 0.5]);
    }

    #[test]
    fn test_map_channels_identity() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(map_channels(&samples, 2, 2), samples);
    }

    #[test]
    fn test_interleave_round_trip() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let planes = deinterleave(&samples, 2);
        assert_eq!(planes[0], vec![0.1, 0.3, 0.5]);
        assert_eq!(planes[1], vec![0.2, 0.4, 0.6]);
        assert_eq!(interleave(&planes), samples);
    }

    #[test]
    fn test_prepare_same_rate_is_a_passthrough() {
        let wave = DecodedWave {
            samples: vec![0.1, 0.2, 0.3, 0.4],
            sample_rate: 48000,
            channels: 2,
            bits_per_sample: 16,
        };
        let prepared = prepare_for_device(&wave, 48000, 2).unwrap();
        assert_eq!(prepared, wave.samples);
    }
}
