// Startup diagnostic reports
// Dumps what the backend reports about the host and its output devices, and
// the attributes of the decoded buffer, into two text files. The content is
// owned by the backend's query surface; these are dumps, not contracts.

use std::fs;
use std::path::Path;

use cpal::traits::{DeviceTrait, HostTrait};
use ebur128::{EbuR128, Mode};

use crate::audio::decoder::DecodedWave;
use crate::error::HarnessError;

pub struct DeviceEntry {
    pub name: String,
    pub default_config: Option<String>,
    pub supported: Vec<String>,
}

pub struct DeviceReport {
    pub generated_at: String,
    pub host: String,
    pub default_device: Option<String>,
    pub devices: Vec<DeviceEntry>,
}

/// Loudness figures for the decoded payload.
pub struct BufferStats {
    /// Maximum true peak across channels, in dBTP.
    pub true_peak_db: f64,
    /// Integrated loudness in LUFS.
    pub integrated_lufs: f64,
}

/// Query the backend for everything the device report contains.
pub fn collect_device_report() -> DeviceReport {
    let host = cpal::default_host();
    let default_device = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    match host.output_devices() {
        Ok(iter) => {
            for device in iter {
                let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
                let default_config = device.default_output_config().ok().map(|c| {
                    format!(
                        "{} Hz, {} ch, {:?}",
                        c.sample_rate().0,
                        c.channels(),
                        c.sample_format()
                    )
                });
                let supported = match device.supported_output_configs() {
                    Ok(ranges) => ranges
                        .map(|r| {
                            format!(
                                "{} ch, {}-{} Hz, {:?}",
                                r.channels(),
                                r.min_sample_rate().0,
                                r.max_sample_rate().0,
                                r.sample_format()
                            )
                        })
                        .collect(),
                    Err(e) => {
                        tracing::warn!(device = %name, "could not query supported configs: {}", e);
                        Vec::new()
                    }
                };
                devices.push(DeviceEntry {
                    name,
                    default_config,
                    supported,
                });
            }
        }
        Err(e) => tracing::warn!("could not enumerate output devices: {}", e),
    }

    DeviceReport {
        generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        host: host.id().name().to_string(),
        default_device,
        devices,
    }
}

pub fn format_device_report(report: &DeviceReport) -> String {
    let mut out = String::new();
    out.push_str("Output device capability report\n");
    out.push_str(&format!("Generated: {}\n\n", report.generated_at));
    out.push_str(&format!("Host: {}\n", report.host));
    match &report.default_device {
        Some(name) => out.push_str(&format!("Default output device: \"{}\"\n", name)),
        None => out.push_str("Default output device: <none>\n"),
    }
    out.push_str("\nDevices:\n");
    for device in &report.devices {
        out.push_str(&format!("  * {}\n", device.name));
        match &device.default_config {
            Some(config) => out.push_str(&format!("      default  : {}\n", config)),
            None => out.push_str("      default  : <unavailable>\n"),
        }
        for range in &device.supported {
            out.push_str(&format!("      supported: {}\n", range));
        }
    }
    out
}

/// Write the device capability report to `path`.
pub fn write_device_report(path: &Path) -> Result<(), HarnessError> {
    let report = collect_device_report();
    fs::write(path, format_device_report(&report)).map_err(|e| HarnessError::Report {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "device report written");
    Ok(())
}

/// Measure true peak and integrated loudness of the decoded payload.
/// Analysis failure is not fatal; the report notes the figures as
/// unavailable instead.
pub fn analyze_payload(wave: &DecodedWave) -> Option<BufferStats> {
    match try_analyze(wave) {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!("loudness analysis unavailable: {}", e);
            None
        }
    }
}

fn try_analyze(wave: &DecodedWave) -> Result<BufferStats, String> {
    if wave.channels == 0 || wave.samples.is_empty() {
        return Err("empty payload".to_string());
    }

    let mut ebu = EbuR128::new(wave.channels as u32, wave.sample_rate, Mode::I | Mode::TRUE_PEAK)
        .map_err(|e| format!("failed to create analyzer: {}", e))?;

    ebu.add_frames_f32(&wave.samples)
        .map_err(|e| format!("failed to add frames: {}", e))?;

    let integrated_lufs = ebu
        .loudness_global()
        .map_err(|e| format!("failed to get integrated loudness: {}", e))?;

    let mut max_true_peak = f64::NEG_INFINITY;
    for ch in 0..wave.channels {
        let peak = ebu
            .true_peak(ch as u32)
            .map_err(|e| format!("failed to get true peak for channel {}: {}", ch, e))?;
        if peak > max_true_peak {
            max_true_peak = peak;
        }
    }
    let true_peak_db = if max_true_peak > 0.0 {
        20.0 * max_true_peak.log10()
    } else {
        -96.0 // Silence
    };

    Ok(BufferStats {
        true_peak_db,
        integrated_lufs,
    })
}

pub fn format_buffer_report(wave: &DecodedWave, stats: Option<&BufferStats>) -> String {
    let mut out = String::new();
    out.push_str("Decoded buffer attributes\n\n");
    out.push_str(&format!("Sample rate : {} Hz\n", wave.sample_rate));
    out.push_str(&format!("Payload size: {} bytes\n", wave.byte_len()));
    out.push_str(&format!(
        "Bit depth   : {} bits per sample\n",
        wave.bits_per_sample
    ));
    out.push_str(&format!("Channels    : {}\n", wave.channels));
    out.push_str(&format!("Frames      : {}\n", wave.frames()));
    out.push_str(&format!("Duration    : {:.3} s\n", wave.duration_secs()));
    match stats {
        Some(stats) => {
            out.push_str(&format!("True peak   : {:.2} dBTP\n", stats.true_peak_db));
            out.push_str(&format!(
                "Loudness    : {:.2} LUFS (integrated)\n",
                stats.integrated_lufs
            ));
        }
        None => {
            out.push_str("True peak   : unavailable\n");
            out.push_str("Loudness    : unavailable\n");
        }
    }
    out
}

/// Write the buffer attributes report to `path`.
pub fn write_buffer_report(path: &Path, wave: &DecodedWave) -> Result<(), HarnessError> {
    let stats = analyze_payload(wave);
    fs::write(path, format_buffer_report(wave, stats.as_ref())).map_err(|e| {
        HarnessError::Report {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    tracing::info!(path = %path.display(), "buffer report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wave() -> DecodedWave {
        // Four seconds of a 440 Hz tone at half amplitude, mono 48 kHz.
        let rate = 48000u32;
        let samples: Vec<f32> = (0..rate as usize * 4)
            .map(|i| {
                let t = i as f32 / rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect();
        DecodedWave {
            samples,
            sample_rate: rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    #[test]
    fn test_buffer_report_lists_payload_attributes() {
        let wave = DecodedWave {
            samples: vec![0.0; 88200 * 2],
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        };
        let text = format_buffer_report(&wave, None);
        assert!(text.contains("Sample rate : 44100 Hz"));
        assert!(text.contains("Payload size: 352800 bytes"));
        assert!(text.contains("Bit depth   : 16 bits per sample"));
        assert!(text.contains("Channels    : 2"));
        assert!(text.contains("Frames      : 88200"));
        assert!(text.contains("Duration    : 2.000 s"));
        assert!(text.contains("True peak   : unavailable"));
    }

    #[test]
    fn test_buffer_report_includes_loudness_when_available() {
        let wave = sine_wave();
        let stats = BufferStats {
            true_peak_db: -6.02,
            integrated_lufs: -9.1,
        };
        let text = format_buffer_report(&wave, Some(&stats));
        assert!(text.contains("True peak   : -6.02 dBTP"));
        assert!(text.contains("Loudness    : -9.10 LUFS (integrated)"));
    }

    #[test]
    fn test_analyze_sine_payload() {
        let stats = analyze_payload(&sine_wave()).expect("analysis should succeed");
        // Half amplitude is roughly -6 dBTP; leave slack for inter-sample peaks.
        assert!(stats.true_peak_db > -8.0 && stats.true_peak_db < -4.0);
        assert!(stats.integrated_lufs.is_finite());
        assert!(stats.integrated_lufs < 0.0 && stats.integrated_lufs > -40.0);
    }

    #[test]
    fn test_analyze_empty_payload_is_none() {
        let wave = DecodedWave {
            samples: Vec::new(),
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        };
        assert!(analyze_payload(&wave).is_none());
    }

    #[test]
    fn test_device_report_format() {
        let report = DeviceReport {
            generated_at: "2026-01-01 00:00:00".to_string(),
            host: "ALSA".to_string(),
            default_device: Some("default".to_string()),
            devices: vec![DeviceEntry {
                name: "default".to_string(),
                default_config: Some("48000 Hz, 2 ch, F32".to_string()),
                supported: vec!["2 ch, 44100-192000 Hz, F32".to_string()],
            }],
        };
        let text = format_device_report(&report);
        assert!(text.contains("Host: ALSA"));
        assert!(text.contains("Default output device: \"default\""));
        assert!(text.contains("  * default"));
        assert!(text.contains("      default  : 48000 Hz, 2 ch, F32"));
        assert!(text.contains("      supported: 2 ch, 44100-192000 Hz, F32"));
    }

    #[test]
    fn test_device_report_without_default_device() {
        let report = DeviceReport {
            generated_at: "2026-01-01 00:00:00".to_string(),
            host: "ALSA".to_string(),
            default_device: None,
            devices: Vec::new(),
        };
        let text = format_device_report(&report);
        assert!(text.contains("Default output device: <none>"));
    }
}
