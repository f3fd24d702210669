//! Microphone-backed speech recognizer

use std::ops::Deref;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{
    AudioCapture, RecognitionError, SAMPLE_RATE, SpeechRecognizer, SpeechSegmenter, SpeechToText,
    samples_to_wav,
};
use crate::config::Config;
use crate::{Error, Result};

/// How often the capture buffer is drained into the segmenter
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Records one utterance from the default microphone and transcribes it
pub struct MicrophoneRecognizer {
    capture: AudioCapture,
    stt: SpeechToText,
    segmenter: SpeechSegmenter,
    ambient: Duration,
    calibrated: bool,
}

impl MicrophoneRecognizer {
    /// Wrap an open capture device and transcriber
    ///
    /// The first `listen` spends `ambient` sampling background noise.
    #[must_use]
    pub fn new(capture: AudioCapture, stt: SpeechToText, ambient: Duration) -> Self {
        Self {
            capture,
            stt,
            segmenter: SpeechSegmenter::new(),
            ambient,
            calibrated: false,
        }
    }

    /// Open the default microphone and the configured STT backend
    ///
    /// # Errors
    ///
    /// Returns error if there is no usable input device or STT key
    pub fn from_config(config: &Config) -> Result<Self> {
        let stt = SpeechToText::from_config(config)?;
        let capture = AudioCapture::new()?;
        Ok(Self::new(capture, stt, config.voice.ambient_calibration))
    }
}

/// Something with an input stream that must be closed when a listen ends
trait InputStream {
    fn stop(&mut self);
}

impl InputStream for AudioCapture {
    fn stop(&mut self) {
        Self::stop(self);
    }
}

/// Open input stream for the duration of one `listen`
///
/// Stops the stream on drop, so a listen abandoned at an await point
/// (outer bound, shutdown) does not leave the microphone recording.
struct ActiveCapture<'a, C: InputStream>(&'a mut C);

impl<C: InputStream> Deref for ActiveCapture<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.0
    }
}

impl<C: InputStream> Drop for ActiveCapture<'_, C> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Sample background noise into the segmenter's threshold
#[allow(clippy::future_not_send)]
async fn calibrate(capture: &AudioCapture, segmenter: &mut SpeechSegmenter, ambient: Duration) {
    tracing::info!("calibrating for ambient noise");
    tokio::time::sleep(ambient).await;
    let samples = capture.take_buffer();
    segmenter.calibrate(&samples);
}

/// Capture samples until an utterance completes, the onset times out,
/// or the phrase limit cuts it off
#[allow(clippy::future_not_send)]
async fn record(
    capture: &AudioCapture,
    segmenter: &mut SpeechSegmenter,
    timeout: Duration,
    phrase_limit: Duration,
) -> std::result::Result<Vec<f32>, RecognitionError> {
    segmenter.reset();
    capture.clear_buffer();

    let started = Instant::now();
    let mut onset: Option<Instant> = None;

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let chunk = capture.take_buffer();
        if segmenter.push(&chunk) {
            return Ok(segmenter.take_segment());
        }

        match (segmenter.is_speaking(), onset) {
            (true, None) => onset = Some(Instant::now()),
            (true, Some(at)) if at.elapsed() >= phrase_limit => {
                tracing::debug!(limit = ?phrase_limit, "phrase limit reached");
                return Ok(segmenter.take_segment());
            }
            // False start: the segmenter gave up on a click
            (false, Some(_)) => onset = None,
            _ => {}
        }

        if onset.is_none() && started.elapsed() >= timeout {
            return Err(RecognitionError::Timeout);
        }
    }
}

#[async_trait(?Send)]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> std::result::Result<String, RecognitionError> {
        self.capture
            .start()
            .map_err(|e| RecognitionError::Other(e.to_string()))?;
        let capture = ActiveCapture(&mut self.capture);

        if !self.calibrated {
            if !self.ambient.is_zero() {
                calibrate(&capture, &mut self.segmenter, self.ambient).await;
            }
            self.calibrated = true;
        }

        tracing::debug!("listening");
        let recorded = record(&capture, &mut self.segmenter, timeout, phrase_limit).await;
        drop(capture);
        let samples = recorded?;

        let wav = samples_to_wav(&samples, SAMPLE_RATE)
            .map_err(|e| RecognitionError::Other(e.to_string()))?;

        tracing::debug!("recognizing");
        let transcript = self.stt.transcribe(&wav).await.map_err(|e| match e {
            Error::Http(_) | Error::Stt(_) => RecognitionError::ServiceUnavailable(e.to_string()),
            other => RecognitionError::Other(other.to_string()),
        })?;

        normalize_transcript(&transcript).ok_or(RecognitionError::Unintelligible)
    }
}

/// Lowercase and trim a transcript; `None` if nothing was said
fn normalize_transcript(transcript: &str) -> Option<String> {
    let normalized = transcript.trim().to_lowercase();
    (!normalized.is_empty()).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_transcript() {
        assert_eq!(
            normalize_transcript("  OK Jarvis  ").as_deref(),
            Some("ok jarvis")
        );
        assert_eq!(normalize_transcript("   "), None);
        assert_eq!(normalize_transcript(""), None);
    }

    #[derive(Default)]
    struct FakeStream {
        stopped: bool,
    }

    impl InputStream for FakeStream {
        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_listen_closes_stream() {
        let mut stream = FakeStream::default();

        let held = async {
            let _active = ActiveCapture(&mut stream);
            std::future::pending::<()>().await;
        };
        let outcome = tokio::time::timeout(Duration::from_secs(1), held).await;

        assert!(outcome.is_err());
        assert!(stream.stopped);
    }

    #[test]
    fn test_finished_listen_closes_stream() {
        let mut stream = FakeStream::default();
        drop(ActiveCapture(&mut stream));
        assert!(stream.stopped);
    }
}
