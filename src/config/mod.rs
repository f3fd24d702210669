//! Configuration management for the assistant
//!
//! A [`Config`] is built once at startup and handed read-only to every
//! component. Values resolve as: CLI override > environment > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

pub use file::JarvisConfigFile;

/// Assistant configuration snapshot
#[derive(Debug)]
pub struct Config {
    /// Trigger phrase, trimmed and lower-cased
    pub wake_word: String,

    /// Language code passed to speech synthesis
    pub language: String,

    /// Name the assistant introduces itself with
    pub system_name: String,

    /// Name of the person being assisted
    pub user_name: String,

    /// Directory scanned for music files
    pub music_dir: PathBuf,

    /// Path to data directory (memory file, logs)
    pub data_dir: PathBuf,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Memory configuration
    pub memory: MemoryConfig,

    /// Recognition retry configuration
    pub recognition: RecognitionConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Language model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Response length cap
    pub max_tokens: u32,

    /// Upper bound for a single generation
    pub timeout: Duration,
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttBackend {
    Whisper,
    Deepgram,
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    OpenAi,
    ElevenLabs,
}

impl FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

impl FromStr for TtsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub stt_backend: SttBackend,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    pub tts_backend: TtsBackend,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// How long to wait for speech to start
    pub listen_timeout: Duration,

    /// Longest utterance captured once speech started
    pub phrase_limit: Duration,

    /// Playback is force-stopped past this point
    pub playback_deadline: Duration,

    /// Ambient noise sampled before the first capture
    pub ambient_calibration: Duration,

    /// Per-request timeout for the transcription service
    pub stt_timeout: Duration,
}

/// Memory configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Path of the durable JSON document
    pub path: PathBuf,

    /// Capacity of the short-term buffer (0 keeps nothing)
    pub short_term_capacity: usize,

    /// Append every exchange to the durable log
    pub persist_conversations: bool,
}

/// Backoff applied after consecutive recognition failures
#[derive(Debug, Clone, Copy)]
pub struct RecognitionConfig {
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// Hugging Face token (language model)
    pub huggingface: Option<SecretString>,

    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub wake_word: Option<String>,
    pub language: Option<String>,
    pub short_term_capacity: Option<usize>,
    pub listen_timeout_secs: Option<u64>,
    pub phrase_limit_secs: Option<u64>,
    pub memory_file: Option<PathBuf>,
}

/// Return the data directory, creating it if needed
///
/// Uses `~/.local/share/jarvis/` on Linux
pub fn data_dir() -> PathBuf {
    let dir = directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("jarvis"));

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "failed to create data directory"
        );
    }

    dir
}

impl Config {
    /// Load configuration from file and environment, then apply CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid (empty wake word, unknown provider, zero timeout)
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, overrides, data_dir(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from its sources
    ///
    /// `env` looks up environment variables; tests pass a closure over a map.
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid (empty wake word, unknown provider, zero timeout)
    #[allow(clippy::needless_pass_by_value)]
    pub fn resolve<F>(
        fc: JarvisConfigFile,
        overrides: &ConfigOverrides,
        data_dir: PathBuf,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let wake_word = overrides
            .wake_word
            .clone()
            .or_else(|| env("JARVIS_WAKE_WORD"))
            .or(fc.wake_word)
            .unwrap_or_else(|| "jarvis".to_string())
            .trim()
            .to_lowercase();
        if wake_word.is_empty() {
            return Err(Error::Config("wake word must not be empty".to_string()));
        }

        let language = overrides
            .language
            .clone()
            .or_else(|| env("JARVIS_LANGUAGE"))
            .or(fc.language)
            .unwrap_or_else(|| "en".to_string());

        let music_dir = env("JARVIS_MUSIC_DIR")
            .or(fc.music_dir)
            .map_or_else(|| PathBuf::from("music"), PathBuf::from);

        // LLM config (env > toml > default)
        let llm = LlmConfig {
            model: env("JARVIS_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "deepseek-ai/DeepSeek-V3".to_string()),
            base_url: env("JARVIS_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| "https://router.huggingface.co/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            max_tokens: fc.llm.max_tokens.unwrap_or(150),
            timeout: Duration::from_secs(fc.llm.timeout_secs.unwrap_or(60)),
        };

        // Voice config (cli > env > toml > default)
        let stt_backend = match env("JARVIS_STT_PROVIDER").or(fc.voice.stt_provider) {
            Some(name) => name.parse()?,
            None => SttBackend::Whisper,
        };
        let tts_backend = match env("JARVIS_TTS_PROVIDER").or(fc.voice.tts_provider) {
            Some(name) => name.parse()?,
            None => TtsBackend::OpenAi,
        };

        let listen_timeout = positive_secs(
            "listen timeout",
            overrides.listen_timeout_secs.or(fc.voice.listen_timeout_secs),
            5,
        )?;
        let phrase_limit = positive_secs(
            "phrase limit",
            overrides.phrase_limit_secs.or(fc.voice.phrase_limit_secs),
            3,
        )?;
        let playback_deadline =
            positive_secs("playback deadline", fc.voice.playback_deadline_secs, 10)?;
        let stt_timeout = positive_secs("STT timeout", fc.voice.stt_timeout_secs, 15)?;

        let voice = VoiceConfig {
            stt_backend,
            stt_model: env("JARVIS_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| match stt_backend {
                    SttBackend::Whisper => "whisper-1".to_string(),
                    SttBackend::Deepgram => "nova-2".to_string(),
                }),
            tts_backend,
            tts_model: env("JARVIS_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| match tts_backend {
                    TtsBackend::OpenAi => "tts-1".to_string(),
                    TtsBackend::ElevenLabs => "eleven_multilingual_v2".to_string(),
                }),
            tts_voice: fc.voice.tts_voice.unwrap_or_else(|| match tts_backend {
                TtsBackend::OpenAi => "alloy".to_string(),
                TtsBackend::ElevenLabs => "21m00Tcm4TlvDq8ikWAM".to_string(),
            }),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            listen_timeout,
            phrase_limit,
            playback_deadline,
            ambient_calibration: Duration::from_millis(
                fc.voice.ambient_calibration_ms.unwrap_or(1500),
            ),
            stt_timeout,
        };

        let memory = MemoryConfig {
            path: overrides
                .memory_file
                .clone()
                .or_else(|| env("JARVIS_MEMORY_FILE").map(PathBuf::from))
                .or_else(|| fc.memory.path.map(PathBuf::from))
                .unwrap_or_else(|| data_dir.join("jarvis_memory.json")),
            short_term_capacity: overrides
                .short_term_capacity
                .or_else(|| env_parse(&env, "JARVIS_SHORT_TERM_CAPACITY"))
                .or(fc.memory.short_term_capacity)
                .unwrap_or(100),
            persist_conversations: fc.memory.persist_conversations.unwrap_or(true),
        };

        let backoff_initial = Duration::from_millis(fc.recognition.backoff_initial_ms.unwrap_or(250));
        let recognition = RecognitionConfig {
            backoff_initial,
            backoff_max: Duration::from_millis(fc.recognition.backoff_max_ms.unwrap_or(5000))
                .max(backoff_initial),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            huggingface: env("HUGGINGFACE_API_KEY")
                .or_else(|| env("HF_TOKEN"))
                .or(fc.api_keys.huggingface)
                .map(SecretString::from),
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
            deepgram: env("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
        };

        Ok(Self {
            wake_word,
            language,
            system_name: fc.system_name.unwrap_or_else(|| "JARVIS".to_string()),
            user_name: fc.user_name.unwrap_or_else(|| "User".to_string()),
            music_dir,
            data_dir,
            llm,
            voice,
            memory,
            recognition,
            api_keys,
        })
    }
}

fn env_parse<F, T>(env: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

fn positive_secs(name: &str, value: Option<u64>, default: u64) -> Result<Duration> {
    match value.unwrap_or(default) {
        0 => Err(Error::Config(format!("{name} must be at least one second"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn resolve_with(
        fc: JarvisConfigFile,
        overrides: &ConfigOverrides,
        vars: &[(&str, &str)],
    ) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(fc, overrides, PathBuf::from("/data"), |key| {
            vars.get(key).cloned()
        })
    }

    #[test]
    fn test_defaults() {
        let config =
            resolve_with(JarvisConfigFile::default(), &ConfigOverrides::default(), &[]).unwrap();

        assert_eq!(config.wake_word, "jarvis");
        assert_eq!(config.language, "en");
        assert_eq!(config.system_name, "JARVIS");
        assert_eq!(config.music_dir, PathBuf::from("music"));
        assert_eq!(config.llm.model, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.llm.max_tokens, 150);
        assert_eq!(config.voice.listen_timeout, Duration::from_secs(5));
        assert_eq!(config.voice.phrase_limit, Duration::from_secs(3));
        assert_eq!(config.voice.playback_deadline, Duration::from_secs(10));
        assert_eq!(config.voice.ambient_calibration, Duration::from_millis(1500));
        assert_eq!(config.voice.stt_timeout, Duration::from_secs(15));
        assert_eq!(config.memory.short_term_capacity, 100);
        assert_eq!(config.memory.path, PathBuf::from("/data/jarvis_memory.json"));
        assert!(config.api_keys.huggingface.is_none());
    }

    #[test]
    fn test_precedence() {
        let fc = file::parse_config_file(
            r#"
wake_word = "friday"
language = "de"

[memory]
short_term_capacity = 10
"#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            wake_word: Some("  Computer ".to_string()),
            ..ConfigOverrides::default()
        };

        let config = resolve_with(
            fc,
            &overrides,
            &[
                ("JARVIS_WAKE_WORD", "karen"),
                ("JARVIS_LANGUAGE", "fr"),
                ("JARVIS_SHORT_TERM_CAPACITY", "0"),
                ("HF_TOKEN", "hf_test"),
            ],
        )
        .unwrap();

        // cli beats env, env beats file
        assert_eq!(config.wake_word, "computer");
        assert_eq!(config.language, "fr");
        assert_eq!(config.memory.short_term_capacity, 0);
        assert_eq!(
            config.api_keys.huggingface.as_ref().map(|k| k.expose_secret()),
            Some("hf_test")
        );
    }

    #[test]
    fn test_provider_defaults_follow_backend() {
        let fc = file::parse_config_file(
            r#"
[voice]
stt_provider = "deepgram"
tts_provider = "ElevenLabs"
"#,
        )
        .unwrap();

        let config = resolve_with(fc, &ConfigOverrides::default(), &[]).unwrap();
        assert_eq!(config.voice.stt_backend, SttBackend::Deepgram);
        assert_eq!(config.voice.stt_model, "nova-2");
        assert_eq!(config.voice.tts_backend, TtsBackend::ElevenLabs);
        assert_eq!(config.voice.tts_model, "eleven_multilingual_v2");
    }

    #[test]
    fn test_invalid_values() {
        let blank = ConfigOverrides {
            wake_word: Some("   ".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(resolve_with(JarvisConfigFile::default(), &blank, &[]).is_err());

        let zero = ConfigOverrides {
            listen_timeout_secs: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(resolve_with(JarvisConfigFile::default(), &zero, &[]).is_err());

        assert!(
            resolve_with(
                JarvisConfigFile::default(),
                &ConfigOverrides::default(),
                &[("JARVIS_STT_PROVIDER", "carrier-pigeon")]
            )
            .is_err()
        );
    }

    #[test]
    fn test_keys_are_redacted_in_debug() {
        let config = resolve_with(
            JarvisConfigFile::default(),
            &ConfigOverrides::default(),
            &[("OPENAI_API_KEY", "sk-very-secret")],
        )
        .unwrap();

        assert!(!format!("{config:?}").contains("sk-very-secret"));
    }
}
