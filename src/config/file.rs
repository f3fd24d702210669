//! TOML configuration file loading
//!
//! Supports `~/.config/jarvis/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JarvisConfigFile {
    /// Trigger phrase (e.g. "jarvis")
    pub wake_word: Option<String>,

    /// Language code for speech synthesis (e.g. "en")
    pub language: Option<String>,

    /// Name the assistant introduces itself with
    pub system_name: Option<String>,

    /// Name of the person being assisted
    pub user_name: Option<String>,

    /// Directory scanned by `play-music`
    pub music_dir: Option<String>,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryFileConfig,

    /// Recognition retry configuration
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "deepseek-ai/DeepSeek-V3")
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    /// Response length cap
    pub max_tokens: Option<u32>,

    /// Per-request timeout
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT backend ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS backend ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    pub listen_timeout_secs: Option<u64>,
    pub phrase_limit_secs: Option<u64>,
    pub playback_deadline_secs: Option<u64>,
    pub ambient_calibration_ms: Option<u64>,
    pub stt_timeout_secs: Option<u64>,
}

/// Memory configuration
#[derive(Debug, Default, Deserialize)]
pub struct MemoryFileConfig {
    /// Path of the durable JSON document
    pub path: Option<String>,

    /// Capacity of the short-term buffer
    pub short_term_capacity: Option<usize>,

    /// Write every exchange to the durable log
    pub persist_conversations: Option<bool>,
}

/// Recognition backoff configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    pub backoff_initial_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub huggingface: Option<String>,
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `JarvisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> JarvisConfigFile {
    let Some(path) = config_file_path() else {
        return JarvisConfigFile::default();
    };

    if !path.exists() {
        return JarvisConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JarvisConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JarvisConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config_file(content: &str) -> crate::Result<JarvisConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/jarvis/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("jarvis").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let fc = parse_config_file(
            r#"
wake_word = "friday"

[voice]
listen_timeout_secs = 8

[memory]
short_term_capacity = 10
"#,
        )
        .unwrap();

        assert_eq!(fc.wake_word.as_deref(), Some("friday"));
        assert_eq!(fc.voice.listen_timeout_secs, Some(8));
        assert_eq!(fc.memory.short_term_capacity, Some(10));
        assert!(fc.llm.model.is_none());
        assert!(fc.api_keys.openai.is_none());
    }

    #[test]
    fn test_malformed_file() {
        assert!(parse_config_file("wake_word = [").is_err());
    }
}
