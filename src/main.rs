// Waveplay - interactive playback test harness
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use waveplay::console;
use waveplay::session::AudioSession;
use waveplay::settings::HarnessSettings;

#[derive(Parser, Debug)]
#[command(
    name = "waveplay",
    version,
    about = "Interactive playback test harness for a cpal/symphonia audio stack"
)]
struct Args {
    /// Wave file to load (overrides the settings file)
    wave: Option<PathBuf>,

    /// Output device name substring; the default device when omitted
    #[arg(long)]
    device: Option<String>,

    /// Loop the buffer instead of stopping at the end
    #[arg(long = "loop")]
    looping: bool,

    /// Initial gain applied to master and source, 0.0 to 1.0
    #[arg(long)]
    gain: Option<f32>,

    /// Settings file path
    #[arg(long, default_value = "waveplay.json")]
    settings: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let first_run = !args.settings.exists();
    let mut settings = HarnessSettings::load(&args.settings)
        .with_context(|| format!("failed to load settings from {}", args.settings.display()))?;
    if first_run {
        if let Err(e) = settings.save(&args.settings) {
            tracing::warn!("could not persist default settings: {}", e);
        }
    }

    // CLI arguments win over the settings file
    if let Some(wave) = args.wave {
        settings.wave_path = wave;
    }
    if let Some(device) = args.device {
        settings.device = Some(device);
    }
    if args.looping {
        settings.looping = true;
    }
    if let Some(gain) = args.gain {
        settings.gain = gain;
    }

    let session = AudioSession::open(&settings).context("audio setup failed")?;
    console::run(&session).context("console loop failed")?;
    session.shutdown();

    Ok(())
}
