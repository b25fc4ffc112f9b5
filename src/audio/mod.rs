// Audio playback module
// Uses Symphonia for decoding and cpal for output

pub mod decoder;
pub mod output;
pub mod source;

pub use decoder::DecodedWave;
pub use output::AudioOutput;
pub use source::SourceState;
