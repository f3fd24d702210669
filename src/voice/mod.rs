//! Voice processing module
//!
//! Defines the two speech collaborators the assistant loop talks to and
//! their microphone/speaker implementations:
//!
//! ```text
//! cpal capture → SpeechSegmenter → WAV → Whisper/Deepgram   (MicrophoneRecognizer)
//! OpenAI/ElevenLabs TTS → MP3 → resample → cpal playback    (SpeakerSynthesizer)
//! ```

mod capture;
mod decode;
mod microphone;
mod playback;
mod segmenter;
mod speaker;
mod stt;
mod tts;
mod wake_word;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use decode::{DecodedAudio, decode_file, decode_mp3, decode_wav, resample};
pub use microphone::MicrophoneRecognizer;
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE};
pub use segmenter::{SegmentState, SpeechSegmenter, rms};
pub use speaker::SpeakerSynthesizer;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use wake_word::contains_wake_word;

/// Why an utterance could not be turned into text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// Nobody started speaking before the timeout
    #[error("listening timed out")]
    Timeout,

    /// Speech was captured but not understood
    #[error("speech was unintelligible")]
    Unintelligible,

    /// Recognition service could not be reached or refused the request
    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything else (device failure, encoding)
    #[error("recognition failed: {0}")]
    Other(String),
}

/// Why text could not be spoken
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// Synthesis or playback exceeded its bound
    #[error("speech synthesis timed out")]
    Timeout,

    /// TTS service failure
    #[error("speech synthesis failed: {0}")]
    Service(String),

    /// Decoding or output device failure
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Turns the next utterance into text
///
/// Futures are not `Send`: audio streams are tied to the thread that opened them.
#[async_trait(?Send)]
pub trait SpeechRecognizer {
    /// Wait up to `timeout` for speech to begin, then capture at most
    /// `phrase_limit` of it and return the transcript
    ///
    /// # Errors
    ///
    /// Returns a [`RecognitionError`] when no transcript was produced
    async fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<String, RecognitionError>;
}

/// Speaks text aloud
#[async_trait(?Send)]
pub trait SpeechSynthesizer {
    /// Speak `text` in `language`; playback is cut off once `deadline` has elapsed
    ///
    /// # Errors
    ///
    /// Returns a [`SynthesisError`] if nothing could be played
    async fn speak(
        &mut self,
        text: &str,
        language: &str,
        deadline: Duration,
    ) -> Result<(), SynthesisError>;
}
