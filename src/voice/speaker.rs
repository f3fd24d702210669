//! Speaker-backed speech synthesizer

use std::time::Duration;

use async_trait::async_trait;

use super::{AudioPlayback, SpeechSynthesizer, SynthesisError, TextToSpeech};
use crate::Result;
use crate::config::Config;

/// Synthesizes text with a TTS service and plays it on the default output
pub struct SpeakerSynthesizer {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl SpeakerSynthesizer {
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }

    /// Open the default output device and the configured TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if there is no usable output device or TTS key
    pub fn from_config(config: &Config) -> Result<Self> {
        let tts = TextToSpeech::from_config(config)?;
        let playback = AudioPlayback::new()?;
        Ok(Self::new(tts, playback))
    }
}

#[async_trait(?Send)]
impl SpeechSynthesizer for SpeakerSynthesizer {
    async fn speak(
        &mut self,
        text: &str,
        language: &str,
        deadline: Duration,
    ) -> std::result::Result<(), SynthesisError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        tracing::info!(text, "speaking");

        let audio = self
            .tts
            .synthesize(text, language)
            .await
            .map_err(|e| SynthesisError::Service(e.to_string()))?;

        self.playback
            .play_mp3(&audio, Some(deadline))
            .await
            .map_err(|e| SynthesisError::Playback(e.to_string()))
    }
}
