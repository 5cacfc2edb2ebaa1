//! Dubbed track assembly.
//!
//! After a batch, every aligned segment's winning audio is laid onto a silent
//! mono timeline at its subtitle `start`, cut to its `end - start` slot.
//! Segments that gave up or failed stay silent.

use crate::align::types::AudioHandle;
use crate::batch::{BatchReport, Segment, SegmentOutcome};
use crate::duration::DecodedAudio;
use crate::error::{DubalignError, DubalignResult, DurationMeasurementError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use tracing::{info, warn};

/// Track rate when no clip could be loaded (MiniMax's default output rate).
pub const FALLBACK_SAMPLE_RATE: u32 = 32_000;

/// Where one aligned segment's audio goes on the track.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub segment_index: usize,
    pub start: f64,
    pub end: f64,
    pub audio: AudioHandle,
}

/// Pair segments with their report details (both in input order) and keep the
/// ones that aligned and carry subtitle timing.
pub fn placements(segments: &[Segment], report: &BatchReport) -> Vec<Placement> {
    segments
        .iter()
        .zip(&report.details)
        .filter_map(|(segment, detail)| {
            let SegmentOutcome::Aligned(result) = &detail.result else {
                return None;
            };
            let audio = result.audio_handle.clone().filter(|_| result.success)?;
            match (segment.start, segment.end) {
                (Some(start), Some(end)) if end > start && start >= 0.0 => Some(Placement {
                    segment_index: detail.segment_index,
                    start,
                    end,
                    audio,
                }),
                _ => {
                    warn!(
                        "Segment {} has no usable start/end, left off the track",
                        detail.segment_index
                    );
                    None
                }
            }
        })
        .collect()
}

/// Build the track for a finished batch. It runs to the latest segment `end`.
pub fn assemble_track<F>(segments: &[Segment], report: &BatchReport, load: F) -> DecodedAudio
where
    F: FnMut(&AudioHandle) -> Result<DecodedAudio, DurationMeasurementError>,
{
    let length = segments
        .iter()
        .filter_map(|s| s.end)
        .filter(|end| end.is_finite())
        .fold(0.0, f64::max);
    render_track(&placements(segments, report), length, load)
}

/// Mix `placements` onto `length_secs` of silence. Clips that fail to load or
/// resample are skipped; overlapping clips are summed.
pub fn render_track<F>(placements: &[Placement], length_secs: f64, mut load: F) -> DecodedAudio
where
    F: FnMut(&AudioHandle) -> Result<DecodedAudio, DurationMeasurementError>,
{
    let mut clips = Vec::with_capacity(placements.len());
    for placement in placements {
        match load(&placement.audio) {
            Ok(audio) => clips.push((placement, audio)),
            Err(e) => warn!("Segment {} left silent: {e}", placement.segment_index),
        }
    }

    let sample_rate = clips
        .first()
        .map(|(_, audio)| audio.sample_rate)
        .unwrap_or(FALLBACK_SAMPLE_RATE);
    let length = placements.iter().map(|p| p.end).fold(length_secs, f64::max);
    let mut track = vec![0.0f32; frames_at(length, sample_rate)];

    for (placement, audio) in &clips {
        let mono = downmix(audio);
        let samples = match resample(&mono, audio.sample_rate, sample_rate) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Segment {} left silent: {e}", placement.segment_index);
                continue;
            }
        };
        let offset = frames_at(placement.start, sample_rate).min(track.len());
        let slot = frames_at(placement.end, sample_rate).saturating_sub(offset);
        for (dst, src) in track[offset..].iter_mut().zip(samples.iter().take(slot)) {
            *dst += *src;
        }
    }

    info!(
        "Assembled {:.3}s track from {}/{} clip(s) at {} Hz",
        length,
        clips.len(),
        placements.len(),
        sample_rate
    );
    DecodedAudio {
        samples: track,
        sample_rate,
        channels: 1,
    }
}

/// Write `audio` as 16-bit PCM WAV, clipping at full scale.
pub fn write_wav(path: &Path, audio: &DecodedAudio) -> DubalignResult<()> {
    let fail = |e: hound::Error| DubalignError::TrackWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let spec = hound::WavSpec {
        channels: audio.channels.max(1) as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(fail)?;
    for &sample in &audio.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value).map_err(fail)?;
    }
    writer.finalize().map_err(fail)
}

fn frames_at(secs: f64, sample_rate: u32) -> usize {
    (secs.max(0.0) * sample_rate as f64).round() as usize
}

fn downmix(audio: &DecodedAudio) -> Vec<f32> {
    let channels = audio.channels.max(1);
    if channels == 1 {
        return audio.samples.clone();
    }
    audio
        .samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono `samples` in one pass, dropping the filter delay so the
/// output starts where the input did.
fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, String> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| format!("resampler setup failed ({from} Hz -> {to} Hz): {e}"))?;
    let delay = resampler.output_delay();

    let mut out = resampler
        .process(&[samples], None)
        .map_err(|e| format!("resampling failed: {e}"))?
        .remove(0);
    let tail = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| format!("resampling failed: {e}"))?;
    out.extend(tail.into_iter().flatten());

    let wanted = (samples.len() as f64 * ratio).round() as usize;
    let mut out: Vec<f32> = out.into_iter().skip(delay).collect();
    out.resize(wanted, 0.0);
    Ok(out)
}
