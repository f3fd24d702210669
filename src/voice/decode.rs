//! Audio decoding and resampling for playback

use std::io::Cursor;
use std::path::Path;

use crate::{Error, Result};

/// Mono samples and the rate they were recorded at
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid MP3
#[allow(clippy::cast_sign_loss)]
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate.get_or_insert(frame.sample_rate as u32);

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Audio("MP3 contained no audio frames".to_string()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Decode WAV bytes (integer or float PCM) to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid WAV
#[allow(clippy::cast_precision_loss)]
pub fn decode_wav(wav_data: &[u8]) -> Result<DecodedAudio> {
    let wav_err = |e: hound::Error| Error::Audio(format!("WAV decode error: {e}"));

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).map_err(wav_err)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(wav_err)?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(wav_err)?
        }
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, usize::from(spec.channels)),
        sample_rate: spec.sample_rate,
    })
}

/// Decode an audio file by extension
///
/// # Errors
///
/// Returns error if the file cannot be read, has an unsupported format, or fails to decode
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "mp3" => decode_mp3(&std::fs::read(path)?),
        "wav" => decode_wav(&std::fs::read(path)?),
        other => Err(Error::Audio(format!(
            "unsupported audio format for playback: {}",
            if other.is_empty() { "<none>" } else { other }
        ))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio using rubato
///
/// # Errors
///
/// Returns error if the resampler cannot be built for these rates
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize + chunk_size);

    for chunk in input.chunks(chunk_size) {
        let result = if chunk.len() == chunk_size {
            resampler.process(&[chunk.to_vec()], None)
        } else {
            // Zero-padded tail
            resampler.process_partial(Some(&[chunk.to_vec()][..]), None)
        }
        .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;

        output.extend_from_slice(&result[0]);
    }

    Ok(output.iter().map(|&s| s as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{SAMPLE_RATE, samples_to_wav};

    #[test]
    fn test_wav_decode() {
        let original = vec![0.0, 0.5, -0.5, 0.25];
        let wav = samples_to_wav(&original, SAMPLE_RATE).unwrap();

        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.sample_rate, SAMPLE_RATE);
        assert_eq!(decoded.samples.len(), original.len());
        for (a, b) in original.iter().zip(&decoded.samples) {
            assert!((a - b).abs() < 0.001);
        }
    }

    #[test]
    fn test_downmix_stereo() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_resample_ratio() {
        let one_second = vec![0.1_f32; 16_000];
        let out = resample(&one_second, 16_000, 24_000).unwrap();

        let ratio = out.len() as f32 / 24_000.0;
        assert!((ratio - 1.0).abs() < 0.05, "got {} samples", out.len());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 24_000, 24_000).unwrap(), samples);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(decode_file(Path::new("song.flac")).is_err());
    }

    #[test]
    fn test_garbage_mp3() {
        assert!(decode_mp3(b"definitely not audio").is_err());
    }
}
