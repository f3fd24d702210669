//! Text-to-speech (TTS) processing

use secrecy::{ExposeSecret, SecretString};

use crate::config::{Config, TtsBackend};
use crate::{Error, Result};

/// Synthesizes speech from text as MP3
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    backend: TtsBackend,
}

impl TextToSpeech {
    /// Create a synthesizer for `backend`
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(
        backend: TtsBackend,
        api_key: SecretString,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(format!("API key required for {backend:?} TTS")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            backend,
        })
    }

    /// Create a synthesizer from the assistant configuration
    ///
    /// # Errors
    ///
    /// Returns error if the key for the configured backend is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let (key, var) = match config.voice.tts_backend {
            TtsBackend::OpenAi => (&config.api_keys.openai, "OPENAI_API_KEY"),
            TtsBackend::ElevenLabs => (&config.api_keys.elevenlabs, "ELEVENLABS_API_KEY"),
        };
        let api_key = key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| Error::Config(format!("{var} required for speech synthesis")))?;

        Self::new(
            config.voice.tts_backend,
            api_key,
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )
    }

    /// Synthesize text to speech
    ///
    /// Returns MP3 bytes.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        match self.backend {
            TtsBackend::OpenAi => self.synthesize_openai(text).await,
            TtsBackend::ElevenLabs => self.synthesize_elevenlabs(text, language).await,
        }
    }

    /// Synthesize using OpenAI TTS (language is inferred from the text)
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            language_code: Option<&'a str>,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            language_code: accepts_language_code(&self.model).then_some(language),
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Only the v2.5 ElevenLabs models take an explicit language code
fn accepts_language_code(model: &str) -> bool {
    model.contains("v2_5")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_code_support() {
        assert!(accepts_language_code("eleven_turbo_v2_5"));
        assert!(accepts_language_code("eleven_flash_v2_5"));
        assert!(!accepts_language_code("eleven_multilingual_v2"));
    }
}
