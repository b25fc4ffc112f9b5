// Harness settings and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HarnessError;

/// Main harness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessSettings {
    /// Wave file loaded into the single buffer
    pub wave_path: PathBuf,
    /// Output device name substring; the default device when absent
    pub device: Option<String>,
    /// Loop the buffer instead of stopping at the end
    pub looping: bool,
    /// Initial gain applied to both the master and the source, 0.0 to 1.0
    pub gain: f32,
    /// Where the device capability report is written
    pub device_report: PathBuf,
    /// Where the buffer attributes report is written
    pub buffer_report: PathBuf,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            wave_path: PathBuf::from("test.wav"),
            device: None,
            looping: false,
            gain: 1.0,
            device_report: PathBuf::from("device_report.txt"),
            buffer_report: PathBuf::from("buffer_report.txt"),
        }
    }
}

impl HarnessSettings {
    /// Load settings from file, or return defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| HarnessError::Settings {
            path: path.to_path_buf(),
            reason: format!("failed to read: {}", e),
        })?;

        let settings: HarnessSettings =
            serde_json::from_str(&content).map_err(|e| HarnessError::Settings {
                path: path.to_path_buf(),
                reason: format!("failed to parse: {}", e),
            })?;

        tracing::info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<(), HarnessError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| HarnessError::Settings {
            path: path.to_path_buf(),
            reason: format!("failed to serialize: {}", e),
        })?;

        fs::write(path, content).map_err(|e| HarnessError::Settings {
            path: path.to_path_buf(),
            reason: format!("failed to write: {}", e),
        })?;

        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = HarnessSettings::default();
        assert_eq!(settings.wave_path, PathBuf::from("test.wav"));
        assert_eq!(settings.device, None);
        assert!(!settings.looping);
        assert_eq!(settings.gain, 1.0);
        assert_eq!(settings.device_report, PathBuf::from("device_report.txt"));
        assert_eq!(settings.buffer_report, PathBuf::from("buffer_report.txt"));
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = HarnessSettings::default();
        settings.wave_path = PathBuf::from("chime.wav");
        settings.device = Some("USB".to_string());
        settings.looping = true;
        settings.gain = 0.25;

        let json = serde_json::to_string_pretty(&settings).unwrap();
        let parsed: HarnessSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.wave_path, PathBuf::from("chime.wav"));
        assert_eq!(parsed.device, Some("USB".to_string()));
        assert!(parsed.looping);
        assert_eq!(parsed.gain, 0.25);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let settings =
            HarnessSettings::load(Path::new("definitely-does-not-exist.json")).unwrap();
        assert_eq!(settings.wave_path, HarnessSettings::default().wave_path);
    }
}
