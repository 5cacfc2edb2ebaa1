//! Batch alignment: many segments through one shared set of collaborators.

use crate::align::types::{AlignmentRequest, AlignmentResult, OptimizationStep, VocabularyEntry};
use crate::align::AlignmentController;
use crate::config::Config;
use crate::duration::{DurationAnalyzer, TrimmedDurationAnalyzer};
use crate::error::{DubalignError, DubalignResult};
use crate::subtitle::SubtitleEntry;
use crate::tts::{self, SpeechSynthesizer, TextShortener};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// The collaborators an alignment runs against.
pub struct Pipeline {
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    pub shortener: Option<Box<dyn TextShortener>>,
    pub analyzer: Box<dyn DurationAnalyzer>,
}

impl Pipeline {
    /// Build the configured synthesizer, shortener and analyzer.
    pub fn from_config(config: &Config) -> DubalignResult<Self> {
        let synthesizer = tts::create_synthesizer(config)?;
        let shortener = tts::create_shortener(config)?;
        let analyzer = TrimmedDurationAnalyzer::new(
            config.alignment.silence_threshold_db,
            Duration::from_secs_f64(config.alignment.request_timeout_secs),
        );
        info!(
            "Pipeline: engine={}, shortening={}",
            synthesizer.engine_name(),
            if shortener.is_some() { "on" } else { "off" }
        );
        Ok(Self {
            synthesizer,
            shortener,
            analyzer: Box::new(analyzer),
        })
    }

    pub fn controller(&self) -> AlignmentController<'_> {
        AlignmentController::new(
            self.synthesizer.as_ref(),
            self.shortener.as_deref(),
            self.analyzer.as_ref(),
        )
    }
}

/// Project-level values filled into every request.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub voice_id: String,
    pub emotion: String,
    pub model: String,
    pub max_speed: f64,
    pub target_language: String,
    pub language_boost: String,
    pub custom_vocabulary: Vec<VocabularyEntry>,
}

impl RequestDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            voice_id: config.synthesis.default_voice.clone(),
            emotion: config.synthesis.emotion.clone(),
            model: config.synthesis.model.clone(),
            max_speed: config.alignment.max_speed,
            target_language: config.project.target_language.clone(),
            language_boost: config.project.language_boost(),
            custom_vocabulary: config.project.custom_vocabulary.clone(),
        }
    }

    /// Request for one text, with everything else taken from the project.
    pub fn request(&self, text: &str, target_duration: f64, original_text: &str) -> AlignmentRequest {
        AlignmentRequest {
            text: text.to_string(),
            target_duration,
            voice_id: self.voice_id.clone(),
            original_text: original_text.to_string(),
            target_language: self.target_language.clone(),
            custom_vocabulary: self.custom_vocabulary.clone(),
            emotion: self.emotion.clone(),
            language_boost: self.language_boost.clone(),
            model: self.model.clone(),
            max_speed: self.max_speed,
        }
    }
}

/// One segment of a batch input file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub translated_text: String,
    /// Seconds; when absent, `end - start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

impl Segment {
    /// Explicit target, else the subtitle slot length. Missing timing yields 0,
    /// which the controller rejects for this segment only.
    pub fn target_duration(&self) -> f64 {
        match (self.target_duration, self.start, self.end) {
            (Some(d), _, _) => d,
            (None, Some(start), Some(end)) => end - start,
            _ => 0.0,
        }
    }

    fn to_request(&self, defaults: &RequestDefaults) -> AlignmentRequest {
        let mut request =
            defaults.request(&self.translated_text, self.target_duration(), &self.original_text);
        if let Some(voice) = &self.voice_id {
            request.voice_id = voice.clone();
        }
        if let Some(emotion) = &self.emotion {
            request.emotion = emotion.clone();
        }
        request
    }
}

/// Read a JSON array of segments.
pub fn load_segments(path: &Path) -> DubalignResult<Vec<Segment>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| DubalignError::SegmentParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Pair original and translated cues by index; timing comes from the original.
pub fn segments_from_subtitles(
    original: &[SubtitleEntry],
    translated: &[SubtitleEntry],
) -> DubalignResult<Vec<Segment>> {
    if original.len() != translated.len() {
        return Err(DubalignError::SubtitleMismatch(format!(
            "{} original cues vs {} translated cues",
            original.len(),
            translated.len()
        )));
    }

    original
        .iter()
        .map(|orig| {
            let trans = translated
                .iter()
                .find(|t| t.index == orig.index)
                .ok_or_else(|| {
                    DubalignError::SubtitleMismatch(format!(
                        "cue {} has no translation",
                        orig.index
                    ))
                })?;
            Ok(Segment {
                index: Some(orig.index),
                original_text: orig.text.clone(),
                translated_text: trans.text.clone(),
                target_duration: None,
                start: Some(orig.start_secs),
                end: Some(orig.end_secs),
                voice_id: None,
                emotion: None,
            })
        })
        .collect()
}

/// Per-segment outcome in a batch report.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SegmentOutcome {
    Aligned(AlignmentResult),
    Failed(FailedSegment),
}

impl SegmentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SegmentOutcome::Aligned(r) if r.success)
    }
}

/// A segment whose alignment aborted.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSegment {
    pub success: bool,
    pub error: String,
    pub steps: Vec<OptimizationStep>,
    pub trace_ids: Vec<String>,
}

impl FailedSegment {
    fn new(error: String) -> Self {
        Self {
            success: false,
            error,
            steps: Vec::new(),
            trace_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub segment_index: usize,
    pub result: SegmentOutcome,
}

/// Aggregate batch result. Given-up and aborted segments both count as failed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub details: Vec<SegmentReport>,
}

/// Align every segment, at most `parallel` at a time. One segment's failure
/// never stops the others; details come back in input order.
pub async fn run_batch(
    pipeline: Arc<Pipeline>,
    segments: Vec<Segment>,
    defaults: &RequestDefaults,
    parallel: usize,
) -> BatchReport {
    let total = segments.len();
    info!("Batch alignment of {total} segment(s), parallel={parallel}");

    let details: Vec<SegmentReport> = stream::iter(segments.into_iter().enumerate())
        .map(|(i, segment)| {
            let pipeline = Arc::clone(&pipeline);
            let request = segment.to_request(defaults);
            let segment_index = segment.index.unwrap_or(i + 1);
            async move {
                info!("Processing segment {}/{total} (index {segment_index})", i + 1);
                let joined =
                    tokio::task::spawn_blocking(move || pipeline.controller().align(&request))
                        .await;
                let result = match joined {
                    Ok(Ok(result)) => SegmentOutcome::Aligned(result),
                    Ok(Err(e)) => {
                        error!("Segment {segment_index} failed: {e}");
                        SegmentOutcome::Failed(FailedSegment {
                            success: false,
                            error: e.to_string(),
                            steps: e.steps,
                            trace_ids: e.trace_ids,
                        })
                    }
                    Err(e) => {
                        error!("Segment {segment_index} task failed: {e}");
                        SegmentOutcome::Failed(FailedSegment::new(format!(
                            "alignment task failed: {e}"
                        )))
                    }
                };
                SegmentReport {
                    segment_index,
                    result,
                }
            }
        })
        .buffered(parallel.max(1))
        .collect()
        .await;

    let success = details.iter().filter(|d| d.result.is_success()).count();
    let report = BatchReport {
        total,
        success,
        failed: total - success,
        details,
    };
    info!(
        "Batch alignment finished: {} succeeded, {} failed",
        report.success, report.failed
    );
    report
}
