//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use jarvis::voice::{
    SAMPLE_RATE, SegmentState, SpeechSegmenter, contains_wake_word, decode_wav, resample,
    samples_to_wav,
};

/// Generate sine wave audio samples
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in 100ms chunks, the way the microphone recognizer polls
fn feed(segmenter: &mut SpeechSegmenter, samples: &[f32]) -> bool {
    samples.chunks(1600).any(|chunk| segmenter.push(chunk))
}

#[test]
fn test_segmenter_captures_spoken_phrase() {
    let mut segmenter = SpeechSegmenter::new();
    segmenter.calibrate(&generate_silence(0.5));

    assert!(!feed(&mut segmenter, &generate_silence(0.3)));
    assert_eq!(segmenter.state(), SegmentState::Waiting);

    assert!(!feed(&mut segmenter, &generate_sine_samples(220.0, 1.0, 0.5)));
    assert!(segmenter.is_speaking());

    assert!(feed(&mut segmenter, &generate_silence(0.8)));

    let segment = segmenter.take_segment();
    assert!(segment.len() >= SAMPLE_RATE as usize);
    assert_eq!(segmenter.state(), SegmentState::Waiting);
}

#[test]
fn test_segmenter_ignores_noise_below_calibrated_level() {
    let mut segmenter = SpeechSegmenter::new();
    let hum = generate_sine_samples(50.0, 1.0, 0.08);
    segmenter.calibrate(&hum);

    assert!(!feed(&mut segmenter, &hum));
    assert_eq!(segmenter.state(), SegmentState::Waiting);
}

#[test]
fn test_captured_segment_encodes_as_wav() {
    let mut segmenter = SpeechSegmenter::new();
    feed(&mut segmenter, &generate_sine_samples(440.0, 0.5, 0.4));
    feed(&mut segmenter, &generate_silence(0.6));
    let segment = segmenter.take_segment();

    let wav = samples_to_wav(&segment, SAMPLE_RATE).unwrap();
    let decoded = decode_wav(&wav).unwrap();

    assert_eq!(decoded.sample_rate, SAMPLE_RATE);
    assert_eq!(decoded.samples.len(), segment.len());
}

#[test]
#[allow(clippy::cast_precision_loss)]
fn test_capture_rate_resamples_to_playback_rate() {
    let samples = generate_sine_samples(440.0, 0.5, 0.3);
    let out = resample(&samples, SAMPLE_RATE, 24_000).unwrap();

    let expected = samples.len() as f32 * 1.5;
    assert!((out.len() as f32 - expected).abs() / expected < 0.1);
}

#[test]
fn test_wake_word_in_transcripts() {
    assert!(contains_wake_word("hey jarvis please", "jarvis"));
    assert!(contains_wake_word("hey jarvisy please", "jarvis"));
    assert!(contains_wake_word("JARVIS, lights", "jarvis"));
    assert!(!contains_wake_word("hello there", "jarvis"));
}
