//! Audio playback to speakers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::decode::{DecodedAudio, decode_file, decode_mp3, resample};
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays mono audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports 24kHz mono or stereo
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                // Fallback: try stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play samples already at [`PLAYBACK_SAMPLE_RATE`]
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    #[allow(clippy::future_not_send)]
    pub async fn play(&mut self, samples: Vec<f32>, deadline: Option<Duration>) -> Result<()> {
        self.play_samples(samples, deadline).await
    }

    /// Play MP3 bytes, stopping at `deadline` if given
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    #[allow(clippy::future_not_send)]
    pub async fn play_mp3(&mut self, mp3_data: &[u8], deadline: Option<Duration>) -> Result<()> {
        let decoded = decode_mp3(mp3_data)?;
        self.play_decoded(decoded, deadline).await
    }

    /// Play an MP3 or WAV file to the end
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be decoded or played
    #[allow(clippy::future_not_send)]
    pub async fn play_file(&mut self, path: &std::path::Path) -> Result<()> {
        let decoded = decode_file(path)?;
        self.play_decoded(decoded, None).await
    }

    #[allow(clippy::future_not_send)]
    async fn play_decoded(&self, decoded: DecodedAudio, deadline: Option<Duration>) -> Result<()> {
        let samples = resample(&decoded.samples, decoded.sample_rate, PLAYBACK_SAMPLE_RATE)?;
        self.play_samples(samples, deadline).await
    }

    /// Play samples until done or until `deadline` elapses
    ///
    /// The stream stays open across await points; dropping the future
    /// stops playback.
    #[allow(clippy::future_not_send)]
    async fn play_samples(&self, samples: Vec<f32>, deadline: Option<Duration>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = if let Some(&s) = samples.get(pos) {
                                position.store(pos + 1, Ordering::Relaxed);
                                s
                            } else {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            };
                            frame.fill(sample);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Natural length plus slack, capped by the caller's deadline
        let natural = Duration::from_millis(
            (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE) + 500,
        );
        let limit = deadline.map_or(natural, |d| d.min(natural));

        if !wait_until_finished(&finished, limit).await && deadline.is_some_and(|d| d < natural) {
            tracing::warn!(deadline = ?limit, "playback deadline reached, stopping");
        }

        // Small delay to ensure audio finishes
        tokio::time::sleep(Duration::from_millis(100)).await;

        drop(stream);
        tracing::debug!(
            samples = sample_count,
            played = position.load(Ordering::Relaxed),
            "playback complete"
        );

        Ok(())
    }
}

/// Poll `finished` without blocking the runtime; `false` if `limit` elapsed first
async fn wait_until_finished(finished: &AtomicBool, limit: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while !finished.load(Ordering::Relaxed) {
        if start.elapsed() >= limit {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    true
}
