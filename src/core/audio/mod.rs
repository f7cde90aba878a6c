//! Audio resampling, PCM16 encoding, and transport chunking.
//!
//! Realtime speech endpoints take PCM 16-bit signed little-endian mono at a
//! fixed rate: 16 kHz for Gemini Live input, 24 kHz for the OpenAI Realtime
//! path. Arbitrary input audio (WAV files, raw float captures) is decoded to
//! canonical f32 samples, downmixed, resampled by linear interpolation, and
//! quantized. Linear interpolation is deliberate: deterministic, testable
//! bit-for-bit, and avoids a DSP dependency.
//!
//! Chunks are capped at ~100 ms of audio to respect upstream message-size and
//! latency limits; the last chunk of a batch carries a commit marker so the
//! receiver knows to finalize that turn.

use std::io::Read;

use bytes::Bytes;
use thiserror::Error;

/// Gemini Live input sample rate.
pub const TARGET_RATE_GEMINI: u32 = 16_000;

/// OpenAI Realtime API sample rate.
pub const TARGET_RATE_OPENAI: u32 = 24_000;

/// Errors from audio decoding and conversion.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("WAV decode error: {0}")]
    Decode(#[from] hound::Error),

    #[error("Unsupported channel count: {0} (expected mono or stereo)")]
    UnsupportedChannels(u16),
}

/// One transport-sized chunk of PCM16 mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub data: Bytes,
    /// Set on the final chunk of a batch: the receiver should commit the turn.
    pub commit: bool,
}

/// Bytes per ~100 ms chunk of PCM16 mono at the given rate.
pub fn chunk_bytes_for_rate(sample_rate: u32) -> usize {
    (sample_rate as usize / 10) * 2
}

/// Downmix stereo to mono by averaging the channels.
///
/// Averaging happens before resampling; resampling channels independently and
/// averaging afterward changes the phase/aliasing characteristics.
pub fn downmix_stereo(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter()
        .zip(right.iter())
        .map(|(l, r)| (l + r) / 2.0)
        .collect()
}

/// Resample via linear interpolation. Output length is
/// `round(len * target_rate / source_rate)`; identity when the rates match.
pub fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (input.len() as f64 / ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src_index = i as f64 * ratio;
        let floor = src_index as usize;
        let ceil = (floor + 1).min(input.len() - 1);
        let floor = floor.min(input.len() - 1);
        let t = (src_index - floor as f64) as f32;
        output.push(input[floor] * (1.0 - t) + input[ceil] * t);
    }
    output
}

/// Quantize f32 samples in [-1, 1] to PCM16 little-endian bytes.
///
/// Out-of-range input clamps to the representable extremes; it never wraps.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let s = s.clamp(-1.0, 1.0);
        let v = if s < 0.0 {
            (s * 0x8000 as f32) as i16
        } else {
            (s * 0x7FFF as f32) as i16
        };
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Split PCM16 bytes into fixed-size frames, marking the last with `commit`.
pub fn chunk_pcm16(pcm: &[u8], chunk_bytes: usize) -> Vec<AudioFrame> {
    if pcm.is_empty() {
        return Vec::new();
    }
    let mut frames: Vec<AudioFrame> = pcm
        .chunks(chunk_bytes)
        .map(|c| AudioFrame {
            data: Bytes::copy_from_slice(c),
            commit: false,
        })
        .collect();
    if let Some(last) = frames.last_mut() {
        last.commit = true;
    }
    frames
}

/// Decode a WAV stream to canonical mono f32 samples plus its sample rate.
pub fn decode_wav<R: Read>(reader: R) -> Result<(Vec<f32>, u32), AudioError> {
    let reader = hound::WavReader::new(reader)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = match spec.channels {
        1 => interleaved,
        2 => {
            let left: Vec<f32> = interleaved.iter().copied().step_by(2).collect();
            let right: Vec<f32> = interleaved.iter().copied().skip(1).step_by(2).collect();
            downmix_stereo(&left, &right)
        }
        n => return Err(AudioError::UnsupportedChannels(n)),
    };

    Ok((mono, spec.sample_rate))
}

/// Decode a WAV stream, convert to PCM16 mono at `target_rate`, and chunk for
/// transport. The final frame carries the commit marker.
pub fn wav_to_pcm_frames<R: Read>(
    reader: R,
    target_rate: u32,
) -> Result<Vec<AudioFrame>, AudioError> {
    let (samples, source_rate) = decode_wav(reader)?;
    let resampled = resample_linear(&samples, source_rate, target_rate);
    let pcm = f32_to_pcm16(&resampled);
    Ok(chunk_pcm16(&pcm, chunk_bytes_for_rate(target_rate)))
}

/// Convert raw f32 samples (any rate, mono) to chunked PCM16 at `target_rate`.
pub fn samples_to_pcm_frames(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Vec<AudioFrame> {
    let resampled = resample_linear(samples, source_rate, target_rate);
    let pcm = f32_to_pcm16(&resampled);
    chunk_pcm16(&pcm, chunk_bytes_for_rate(target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn resample_length_matches_rate_ratio() {
        let input = vec![0.0f32; 48_000];
        let out = resample_linear(&input, 48_000, 16_000);
        let expected = (48_000f64 * 16_000.0 / 48_000.0).round() as usize;
        assert!((out.len() as i64 - expected as i64).abs() <= 1);

        let up = resample_linear(&input, 48_000, 24_000);
        assert!((up.len() as i64 - 24_000).abs() <= 1);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.25f32, -0.5, 0.75];
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }

    #[test]
    fn resample_interpolates_between_samples() {
        // Downsampling 2:1 lands every other output exactly between inputs.
        let input = vec![0.0f32, 1.0, 0.0, 1.0];
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0); // src index 2.0, exact sample
    }

    #[test]
    fn pcm16_clamps_instead_of_wrapping() {
        let bytes = f32_to_pcm16(&[1.5, -1.5, 1.0, -1.0, 0.0]);
        let v = |i: usize| i16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);
        assert_eq!(v(0), 32767);
        assert_eq!(v(1), -32768);
        assert_eq!(v(2), 32767);
        assert_eq!(v(3), -32768);
        assert_eq!(v(4), 0);
    }

    #[test]
    fn downmix_averages_channels() {
        let mixed = downmix_stereo(&[1.0, 0.0], &[0.0, -1.0]);
        assert_eq!(mixed, vec![0.5, -0.5]);
    }

    #[test]
    fn chunking_marks_only_last_frame_commit() {
        let pcm = vec![0u8; 7000];
        let frames = chunk_pcm16(&pcm, 3200);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data.len(), 3200);
        assert_eq!(frames[2].data.len(), 600);
        assert!(!frames[0].commit);
        assert!(!frames[1].commit);
        assert!(frames[2].commit);
    }

    #[test]
    fn chunking_empty_input_yields_no_frames() {
        assert!(chunk_pcm16(&[], 3200).is_empty());
    }

    #[test]
    fn chunk_size_is_100ms_of_audio() {
        assert_eq!(chunk_bytes_for_rate(TARGET_RATE_GEMINI), 3200);
        assert_eq!(chunk_bytes_for_rate(TARGET_RATE_OPENAI), 4800);
    }

    fn wav_bytes(spec: hound::WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn wav_decode_stereo_downmixes_before_resampling() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        // Two frames: (L=16384, R=0) and (L=0, R=-16384).
        let bytes = wav_bytes(spec, &[16384, 0, 0, -16384]);
        let (mono, rate) = decode_wav(Cursor::new(bytes)).unwrap();

        assert_eq!(rate, 16_000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.25).abs() < 1e-4);
        assert!((mono[1] + 0.25).abs() < 1e-4);
    }

    #[test]
    fn wav_to_frames_resamples_and_commits() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        // 0.5s at 48kHz -> 0.5s at 16kHz = 8000 samples = 16000 bytes = 5 frames.
        let bytes = wav_bytes(spec, &vec![0i16; 24_000]);
        let frames = wav_to_pcm_frames(Cursor::new(bytes), TARGET_RATE_GEMINI).unwrap();

        assert_eq!(frames.len(), 5);
        let total: usize = frames.iter().map(|f| f.data.len()).sum();
        assert_eq!(total, 16_000);
        assert!(frames.last().unwrap().commit);
        assert!(frames[..4].iter().all(|f| !f.commit));
    }
}
