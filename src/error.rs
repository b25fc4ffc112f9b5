// Error types for the harness
// Everything here is fatal during setup; the interactive loop never sees these.

use std::path::PathBuf;
use thiserror::Error;

/// Setup-phase failures, all of which abort the harness before the
/// interactive loop starts.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// No default output device is configured on this system.
    #[error("no output device available")]
    NoOutputDevice,

    /// The requested output device was not found.
    #[error("output device not found: {name}")]
    DeviceNotFound { name: String },

    /// The backend could not report a usable output config.
    #[error("failed to query device config: {reason}")]
    DeviceConfig { reason: String },

    /// The device's native sample format has no conversion path.
    #[error("unsupported output sample format: {format}")]
    UnsupportedFormat { format: String },

    /// Building the output stream failed.
    #[error("failed to build output stream: {reason}")]
    StreamBuild { reason: String },

    /// Starting the output stream failed.
    #[error("failed to start output stream: {reason}")]
    StreamPlay { reason: String },

    /// The stream reported an error while setup was still in progress.
    #[error("audio stream fault during setup: {reason}")]
    StreamFault { reason: String },

    /// The wave file could not be opened.
    #[error("failed to open wave file {path}: {source}")]
    WaveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The wave file could not be probed or has no decodable track.
    #[error("unreadable wave file: {reason}")]
    WaveFormat { reason: String },

    /// Decoding the wave payload failed beyond recovery.
    #[error("failed to decode wave payload: {reason}")]
    WaveDecode { reason: String },

    /// Converting the payload to the device sample rate failed.
    #[error("failed to resample payload: {reason}")]
    Resample { reason: String },

    /// A diagnostic report could not be written.
    #[error("failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file exists but could not be read or parsed.
    #[error("settings file {path}: {reason}")]
    Settings { path: PathBuf, reason: String },
}
