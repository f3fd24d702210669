use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use jarvis::memory::{JsonFileStorage, MemoryStore};
use jarvis::voice::{
    AudioCapture, AudioPlayback, MicrophoneRecognizer, PLAYBACK_SAMPLE_RATE, SpeechRecognizer,
    TextToSpeech, rms,
};
use jarvis::{Config, ConfigOverrides, Daemon, practical};

/// Jarvis - a wake-word voice assistant
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Wake word that starts a command (substring match)
    #[arg(short, long)]
    wake_word: Option<String>,

    /// Language code for speech synthesis and recognition
    #[arg(short, long)]
    language: Option<String>,

    /// Short-term memory capacity
    #[arg(long)]
    capacity: Option<usize>,

    /// Seconds to wait for speech to begin
    #[arg(long, env = "JARVIS_LISTEN_TIMEOUT")]
    listen_timeout: Option<u64>,

    /// Maximum seconds of speech per utterance
    #[arg(long, env = "JARVIS_PHRASE_LIMIT")]
    phrase_limit: Option<u64>,

    /// Path to the long-term memory file
    #[arg(long)]
    memory_file: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Recognize a single utterance and print it
    Listen,
    /// Show recent conversations from long-term memory
    Memory {
        /// Number of conversations to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// Open a website (youtube, google, stackoverflow, or a URL)
    OpenSite {
        site: String,
    },
    /// Play a track from the music directory
    PlayMusic {
        /// Part of the track name; random if omitted
        track: Option<String>,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            wake_word: self.wake_word.clone(),
            language: self.language.clone(),
            short_term_capacity: self.capacity,
            listen_timeout_secs: self.listen_timeout,
            phrase_limit_secs: self.phrase_limit,
            memory_file: self.memory_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("failed to open log file: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Set up console logging, plus a plain-text file layer if requested
fn init_logging(verbose: u8, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info,jarvis=debug"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = cli.overrides();

    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&overrides, &text).await,
            Command::Listen => listen_once(&overrides).await,
            Command::Memory { limit } => show_memory(&overrides, limit),
            Command::OpenSite { site } => {
                let url = practical::open_website(&site)?;
                println!("Opening {url}");
                Ok(())
            }
            Command::PlayMusic { track } => play_music(&overrides, track.as_deref()).await,
        };
    }

    // Load configuration
    let config = Config::load(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    // Create and run daemon
    let daemon = Daemon::new(&config)?;
    tracing::info!("jarvis ready - say \"{}\"", config.wake_word);

    // Run until interrupted
    daemon.run().await;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;

    let frequency = 440.0_f32;
    let num_samples = usize::try_from(PLAYBACK_SAMPLE_RATE * 2)?;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());
    playback.play(samples, None).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output
#[allow(clippy::future_not_send)]
async fn test_tts(overrides: &ConfigOverrides, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(overrides)?;
    let tts = TextToSpeech::from_config(&config)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text, &config.language).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_mp3(&mp3_data, None).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Recognize one utterance
#[allow(clippy::future_not_send)]
async fn listen_once(overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let config = Config::load(overrides)?;
    let mut recognizer = MicrophoneRecognizer::from_config(&config)?;

    println!(
        "Listening (up to {}s for speech, {}s per phrase)...",
        config.voice.listen_timeout.as_secs(),
        config.voice.phrase_limit.as_secs()
    );

    let transcript = recognizer
        .listen(config.voice.listen_timeout, config.voice.phrase_limit)
        .await?;

    println!("Heard: {transcript}");
    if jarvis::voice::contains_wake_word(&transcript, &config.wake_word) {
        println!("(contains wake word \"{}\")", config.wake_word);
    }

    Ok(())
}

/// Print recent long-term conversations
fn show_memory(overrides: &ConfigOverrides, limit: usize) -> anyhow::Result<()> {
    let config = Config::load(overrides)?;
    let store = MemoryStore::open(
        JsonFileStorage::new(&config.memory.path),
        config.memory.short_term_capacity,
    )?;
    let log = store.long_term();

    println!(
        "{}: {} conversations, {} learned preferences, {} system interactions",
        config.memory.path.display(),
        log.conversations.len(),
        log.learned_preferences.len(),
        log.system_interactions.len()
    );

    for entry in store.recent_conversations(limit) {
        println!("[{}] {}", entry.timestamp, entry.content);
    }

    Ok(())
}

/// Play a track from the configured music directory
#[allow(clippy::future_not_send)]
async fn play_music(overrides: &ConfigOverrides, track: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load(overrides)?;
    let mut playback = AudioPlayback::new()?;

    let played = practical::play_music(&config.music_dir, track, &mut playback).await?;
    println!("Played: {}", played.display());

    Ok(())
}
