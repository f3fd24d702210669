//! Energy-based speech segmentation
//!
//! Splits a microphone stream into utterances: speech starts when RMS energy
//! rises above a threshold and ends after a run of silence.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Threshold multiplier applied to calibrated ambient noise
const AMBIENT_FACTOR: f32 = 1.5;

/// Minimum duration of speech to count as an utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for speech
    Waiting,
    /// Speech detected, accumulating
    Speaking,
}

/// Accumulates one utterance at a time
#[derive(Debug)]
pub struct SpeechSegmenter {
    threshold: f32,
    state: SegmentState,
    buffer: Vec<f32>,
    speech_counter: usize,
    silence_counter: usize,
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: ENERGY_THRESHOLD,
            state: SegmentState::Waiting,
            buffer: Vec::new(),
            speech_counter: 0,
            silence_counter: 0,
        }
    }

    /// Raise the speech threshold above the ambient noise in `ambient`
    ///
    /// The threshold never drops below the fixed minimum.
    pub fn calibrate(&mut self, ambient: &[f32]) {
        let level = rms(ambient);
        self.threshold = (level * AMBIENT_FACTOR).max(ENERGY_THRESHOLD);
        tracing::debug!(ambient = level, threshold = self.threshold, "calibrated for ambient noise");
    }

    /// Feed samples; returns true once an utterance is complete
    pub fn push(&mut self, samples: &[f32]) -> bool {
        let energy = rms(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmentState::Waiting => {
                if is_speech {
                    self.state = SegmentState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.speech_counter = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
                false
            }
            SegmentState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.speech_counter += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES && self.speech_counter > MIN_SPEECH_SAMPLES
                {
                    tracing::debug!(samples = self.buffer.len(), "utterance complete");
                    return true;
                }

                // Too much silence without enough speech: a click, not a word
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("false start - resetting");
                    self.reset();
                }

                false
            }
        }
    }

    /// Take the accumulated utterance and go back to waiting
    pub fn take_segment(&mut self) -> Vec<f32> {
        let segment = std::mem::take(&mut self.buffer);
        self.reset();
        segment
    }

    /// Accumulated samples so far
    #[must_use]
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == SegmentState::Speaking
    }

    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }

    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Discard any partial utterance
    pub fn reset(&mut self) {
        self.state = SegmentState::Waiting;
        self.buffer.clear();
        self.speech_counter = 0;
        self.silence_counter = 0;
    }
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms(&loud) > 0.4);

        assert!(rms(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_calibration_never_lowers_threshold() {
        let mut segmenter = SpeechSegmenter::new();
        segmenter.calibrate(&[0.0; 1600]);
        assert!((segmenter.threshold() - ENERGY_THRESHOLD).abs() < f32::EPSILON);

        segmenter.calibrate(&[0.1; 1600]);
        assert!(segmenter.threshold() > 0.14);
    }

    #[test]
    fn test_utterance_completes_after_silence() {
        let mut segmenter = SpeechSegmenter::new();

        assert!(!segmenter.push(&[0.3; 8000]));
        assert!(!segmenter.push(&[0.3; 4800]));
        assert!(segmenter.push(&[0.0; 9600]));

        let segment = segmenter.take_segment();
        assert_eq!(segment.len(), 8000 + 4800 + 9600);
        assert_eq!(segmenter.state(), SegmentState::Waiting);
    }

    #[test]
    fn test_click_is_discarded() {
        let mut segmenter = SpeechSegmenter::new();

        // 10ms of noise, then a second of silence
        assert!(!segmenter.push(&[0.5; 160]));
        assert!(segmenter.is_speaking());
        assert!(!segmenter.push(&[0.0; 16_001]));

        assert_eq!(segmenter.state(), SegmentState::Waiting);
        assert!(segmenter.buffer().is_empty());
    }
}
