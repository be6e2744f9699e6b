use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use candy_voice::levels::LEVELS;
use candy_voice::voice::{AudioPlayback, Recorder, RemoteTts};
use candy_voice::{Config, Daemon};

/// Candy - voice gateway for a number-sense toy
#[derive(Parser)]
#[command(name = "candy", version, about)]
struct Cli {
    /// Host to bind on
    #[arg(long, env = "CANDY_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "CANDY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable the local voice loop (for headless servers without audio hardware)
    #[arg(long, env = "CANDY_DISABLE_VOICE")]
    no_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "一万颗糖")]
        text: String,
    },
    /// Pre-generate clips for the canonical count phrases
    GenerateAudio {
        /// Output directory
        #[arg(short, long, default_value = "audio")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,candy_voice=info",
        1 => "info,candy_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::GenerateAudio { out_dir } => generate_audio(&config, &out_dir).await,
        };
    }

    let voice_enabled = !cli.no_voice;
    tracing::info!(
        host = %config.host,
        port = config.port,
        voice = voice_enabled,
        "starting candy gateway"
    );

    Daemon::new(config).run(voice_enabled).await?;

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Recording for {duration} seconds, speak into your microphone...");

    let mut recorder = Recorder::new();
    recorder.start()?;
    tokio::time::sleep(Duration::from_secs(duration)).await;

    match recorder.stop() {
        Ok(clip) => {
            println!("Captured {} ms of speech after trimming", clip.duration_ms);
            println!("Your microphone is working!");
        }
        Err(candy_voice::Error::NoAudio) => {
            println!("No usable audio captured. Check:");
            println!("  1. Is your mic plugged in?");
            println!("  2. Run: pactl info | grep 'Default Source'");
            println!("  3. Run: arecord -l (to list devices)");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Test TTS output against the vendor endpoint
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Synthesizing: \"{text}\"");

    let tts = RemoteTts::vendor(&config.bigmodel, &config.tts)?;
    let wav = tts.synthesize(text).await?;
    println!("Got {} bytes of audio", wav.len());

    let playback = AudioPlayback::new()?;
    playback.play_wav(&wav, &CancellationToken::new())?;

    println!("If you heard the speech, TTS is working!");
    Ok(())
}

/// Pre-generate one clip per canonical count phrase
async fn generate_audio(config: &Config, out_dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(out_dir).await?;
    let tts = RemoteTts::vendor(&config.bigmodel, &config.tts)?;

    for level in &LEVELS {
        let phrase = format!("{}颗糖", level.cn);
        let path = out_dir.join(format!("{}.wav", level.value));
        if path.is_file() {
            println!("skip {} (exists)", path.display());
            continue;
        }

        let wav = tts.synthesize(&phrase).await?;
        tokio::fs::write(&path, &wav).await?;
        println!("wrote {} ({} bytes)", path.display(), wav.len());
    }

    println!("Done. Point CANDY_AUDIO_DIR at {}", out_dir.display());
    Ok(())
}
