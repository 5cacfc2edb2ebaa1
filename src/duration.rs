//! Silence-trimmed duration measurement of synthesized audio.
//!
//! Audio is fetched (http(s) URL or local path), decoded with symphonia, and
//! leading/trailing chunks quieter than the threshold are dropped before the
//! remaining length is reported.

use crate::align::types::AudioHandle;
use crate::error::DurationMeasurementError;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// Silence threshold: chunks below this level count as silence.
pub const DEFAULT_SILENCE_THRESHOLD_DB: f64 = -50.0;

/// Granularity of the silence scan, in milliseconds.
pub const CHUNK_MS: u32 = 10;

/// Measures how long a piece of synthesized audio actually speaks.
pub trait DurationAnalyzer: Send + Sync {
    fn measure_duration(&self, handle: &AudioHandle) -> Result<f64, DurationMeasurementError>;
}

/// Decoded interleaved PCM.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// The production analyzer: fetch, decode, trim, measure.
pub struct TrimmedDurationAnalyzer {
    agent: ureq::Agent,
    silence_threshold_db: f64,
}

impl TrimmedDurationAnalyzer {
    pub fn new(silence_threshold_db: f64, fetch_timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(fetch_timeout))
            .build()
            .into();
        Self {
            agent,
            silence_threshold_db,
        }
    }

    /// Fetch and decode the audio behind `handle`.
    pub fn load(&self, handle: &AudioHandle) -> Result<DecodedAudio, DurationMeasurementError> {
        let fail = |message: String| DurationMeasurementError {
            handle: handle.to_string(),
            message,
        };
        let bytes = self.fetch(handle).map_err(fail)?;
        decode_audio(bytes, handle.extension().as_deref()).map_err(fail)
    }

    fn fetch(&self, handle: &AudioHandle) -> Result<Vec<u8>, String> {
        if handle.is_remote() {
            let response = self
                .agent
                .get(handle.as_str())
                .call()
                .map_err(|e| format!("download failed: {e}"))?;
            response
                .into_body()
                .with_config()
                .limit(256 * 1024 * 1024)
                .read_to_vec()
                .map_err(|e| format!("failed to read audio body: {e}"))
        } else {
            let path = handle.as_str().strip_prefix("file://").unwrap_or(handle.as_str());
            std::fs::read(path).map_err(|e| format!("failed to read {path}: {e}"))
        }
    }
}

impl Default for TrimmedDurationAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_THRESHOLD_DB, Duration::from_secs(30))
    }
}

impl DurationAnalyzer for TrimmedDurationAnalyzer {
    fn measure_duration(&self, handle: &AudioHandle) -> Result<f64, DurationMeasurementError> {
        let audio = self.load(handle)?;
        let duration = trimmed_duration(&audio, self.silence_threshold_db);
        info!("Audio duration (silence trimmed): {:.3}s", duration);
        Ok(duration)
    }
}

/// Decode an encoded audio payload (mp3, wav) into interleaved f32 samples.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("unrecognized audio format: {e}"))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track found".to_string())?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("unsupported codec: {e}"))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("failed to read packet: {e}")),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Corrupt frames are skipped, the rest of the stream still counts.
            Err(SymphoniaError::DecodeError(e)) => debug!("skipping undecodable packet: {e}"),
            Err(e) => return Err(format!("decode failed: {e}")),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err("audio stream has no sample rate or channel layout".into());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Loudness of a block of samples relative to full scale. Digital silence is `-inf`.
pub fn dbfs(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }
    let mean_square =
        samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64;
    if mean_square == 0.0 {
        return f64::NEG_INFINITY;
    }
    10.0 * mean_square.log10()
}

/// Length in seconds of `audio` after stripping leading and trailing chunks
/// quieter than `threshold_db`. All-silent audio measures 0.0.
pub fn trimmed_duration(audio: &DecodedAudio, threshold_db: f64) -> f64 {
    let channels = audio.channels.max(1);
    let frames = audio.samples.len() / channels;
    if frames == 0 || audio.sample_rate == 0 {
        return 0.0;
    }

    let chunk_frames = ((audio.sample_rate as u64 * CHUNK_MS as u64) / 1000).max(1) as usize;
    let chunk_count = frames.div_ceil(chunk_frames);
    let is_silent = |i: usize| {
        let start = i * chunk_frames * channels;
        let end = ((i + 1) * chunk_frames).min(frames) * channels;
        dbfs(&audio.samples[start..end]) < threshold_db
    };

    let Some(first) = (0..chunk_count).find(|&i| !is_silent(i)) else {
        return 0.0;
    };
    // A loud chunk exists, so the reverse scan always finds one.
    let last = (first..chunk_count)
        .rev()
        .find(|&i| !is_silent(i))
        .unwrap_or(first);

    let start_frame = first * chunk_frames;
    let end_frame = ((last + 1) * chunk_frames).min(frames);
    (end_frame - start_frame) as f64 / audio.sample_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn tone(secs: f64, amplitude: f32) -> Vec<f32> {
        let n = (secs * RATE as f64).round() as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin())
            .collect()
    }

    fn silence(secs: f64) -> Vec<f32> {
        vec![0.0; (secs * RATE as f64).round() as usize]
    }

    fn mono(samples: Vec<f32>) -> DecodedAudio {
        DecodedAudio {
            samples,
            sample_rate: RATE,
            channels: 1,
        }
    }

    /// Encode mono f32 samples as an in-memory 16-bit WAV.
    fn wav_bytes(samples: &[f32], channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                for _ in 0..channels {
                    writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_dbfs_levels() {
        assert_eq!(dbfs(&[]), f64::NEG_INFINITY);
        assert_eq!(dbfs(&[0.0; 64]), f64::NEG_INFINITY);
        assert!((dbfs(&[1.0; 64])).abs() < 1e-9);
        assert!((dbfs(&[0.5; 64]) - (-6.0206)).abs() < 1e-3);
    }

    #[test]
    fn test_trim_leading_and_trailing_silence() {
        let mut samples = silence(0.5);
        samples.extend(tone(1.0, 0.5));
        samples.extend(silence(0.25));
        let d = trimmed_duration(&mono(samples), DEFAULT_SILENCE_THRESHOLD_DB);
        assert!((d - 1.0).abs() < 0.02, "got {d}");
    }

    #[test]
    fn test_interior_silence_is_kept() {
        let mut samples = tone(0.4, 0.5);
        samples.extend(silence(0.3));
        samples.extend(tone(0.4, 0.5));
        let d = trimmed_duration(&mono(samples), DEFAULT_SILENCE_THRESHOLD_DB);
        assert!((d - 1.1).abs() < 0.02, "got {d}");
    }

    #[test]
    fn test_quiet_noise_counts_as_silence() {
        // -60 dBFS hiss around the speech
        let mut samples = tone(0.3, 0.001);
        samples.extend(tone(0.6, 0.5));
        samples.extend(tone(0.3, 0.001));
        let d = trimmed_duration(&mono(samples), DEFAULT_SILENCE_THRESHOLD_DB);
        assert!((d - 0.6).abs() < 0.02, "got {d}");
    }

    #[test]
    fn test_all_silent_measures_zero() {
        assert_eq!(trimmed_duration(&mono(silence(1.0)), -50.0), 0.0);
        assert_eq!(trimmed_duration(&mono(Vec::new()), -50.0), 0.0);
    }

    #[test]
    fn test_decode_wav_stereo() {
        let mut samples = silence(0.2);
        samples.extend(tone(0.5, 0.5));
        let bytes = wav_bytes(&samples, 2);
        let audio = decode_audio(bytes, Some("wav")).unwrap();
        assert_eq!(audio.sample_rate, RATE);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.samples.len(), samples.len() * 2);
        let d = trimmed_duration(&audio, DEFAULT_SILENCE_THRESHOLD_DB);
        assert!((d - 0.5).abs() < 0.02, "got {d}");
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_audio(b"definitely not audio".to_vec(), Some("mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_measure_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let mut samples = silence(0.3);
        samples.extend(tone(0.8, 0.4));
        samples.extend(silence(0.3));
        std::fs::write(&path, wav_bytes(&samples, 1)).unwrap();

        let analyzer = TrimmedDurationAnalyzer::default();
        let d = analyzer
            .measure_duration(&AudioHandle::new(path.display().to_string()))
            .unwrap();
        assert!((d - 0.8).abs() < 0.02, "got {d}");
    }

    #[test]
    fn test_measure_missing_file_fails() {
        let analyzer = TrimmedDurationAnalyzer::default();
        let handle = AudioHandle::new("/nonexistent/clip.mp3");
        let err = analyzer.measure_duration(&handle).unwrap_err();
        assert_eq!(err.handle, "/nonexistent/clip.mp3");
    }
}
