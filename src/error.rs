use crate::align::types::OptimizationStep;
use std::path::PathBuf;
use thiserror::Error;

/// The speech-synthesis backend failed or returned an unusable response.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("speech synthesis failed: {message}")]
pub struct SynthesisError {
    pub message: String,
    pub trace_id: Option<String>,
}

impl SynthesisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace_id: None,
        }
    }
}

/// The text-shortening backend failed. Never fatal to an alignment.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("text shortening failed: {message}")]
pub struct ShorteningError {
    pub message: String,
    pub trace_id: Option<String>,
}

impl ShorteningError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace_id: None,
        }
    }
}

/// Synthesized audio could not be fetched, decoded or measured.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("duration measurement failed for {handle}: {message}")]
pub struct DurationMeasurementError {
    pub handle: String,
    pub message: String,
}

/// Fatal cause of an aborted alignment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignFailure {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    DurationMeasurement(#[from] DurationMeasurementError),

    #[error("invalid alignment request: {0}")]
    InvalidRequest(String),
}

/// An aborted alignment, carrying the trace recorded before the failure.
#[derive(Error, Debug, Clone)]
#[error("alignment aborted after {} recorded step(s): {kind}", .steps.len())]
pub struct AlignError {
    #[source]
    pub kind: AlignFailure,
    pub steps: Vec<OptimizationStep>,
    pub trace_ids: Vec<String>,
}

#[derive(Error, Debug)]
pub enum DubalignError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Already initialized: {0} already exists")]
    AlreadyInitialized(PathBuf),

    #[error("Segment file error in {path}: {message}")]
    SegmentParse { path: PathBuf, message: String },

    #[error("Subtitle mismatch: {0}")]
    SubtitleMismatch(String),

    #[error("Synthesis engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Measurement(#[from] DurationMeasurementError),

    #[error("Failed to write track {path}: {message}")]
    TrackWrite { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DubalignError {
    /// Return an actionable hint for the user, if applicable.
    pub fn hint(&self) -> Option<String> {
        match self {
            DubalignError::ConfigNotFound(_) => Some(
                "Run 'dubalign init' to write a default dubalign.toml, or pass --project <dir>."
                    .into(),
            ),
            DubalignError::ConfigParse(_) => Some(
                "Check dubalign.toml syntax. Run 'dubalign init <dir>' to generate a valid example."
                    .into(),
            ),
            DubalignError::InvalidConfig(msg) => {
                if msg.contains("max_speed") {
                    Some("max_speed must lie between 1.2 and 2.0.".into())
                } else {
                    None
                }
            }
            DubalignError::AlreadyInitialized(_) => Some(
                "Use a different directory, or delete the existing dubalign.toml first.".into(),
            ),
            DubalignError::SegmentParse { .. } => Some(
                "Segment files are JSON arrays of objects with 'translated_text' and either 'target_duration' or 'start'/'end'.".into(),
            ),
            DubalignError::SubtitleMismatch(_) => Some(
                "Original and translated SRT files must contain the same cue indices.".into(),
            ),
            DubalignError::Engine(msg) => {
                if msg.contains("MINIMAX") {
                    Some("Set MINIMAX_API_KEY and MINIMAX_GROUP_ID, or put them in a .env file next to dubalign.toml.".into())
                } else {
                    Some("For offline synthesis set [synthesis] engine = \"native\" and install espeak-ng (Linux) plus ffmpeg.".into())
                }
            }
            DubalignError::Align(e) => match e.kind {
                AlignFailure::Synthesis(_) => Some(
                    "The synthesis backend failed; check credentials, voice id and rate limits.".into(),
                ),
                AlignFailure::DurationMeasurement(_) => Some(
                    "Synthesized audio could not be decoded. Supported formats: mp3, wav.".into(),
                ),
                AlignFailure::InvalidRequest(_) => {
                    Some("Target durations must be positive numbers of seconds.".into())
                }
            },
            DubalignError::Measurement(_) => Some(
                "Pass a local mp3/wav path or an http(s) URL to an mp3/wav file.".into(),
            ),
            _ => None,
        }
    }
}

pub type DubalignResult<T> = Result<T, DubalignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_error_reports_step_count() {
        let err = AlignError {
            kind: AlignFailure::Synthesis(SynthesisError::new("HTTP 500")),
            steps: vec![],
            trace_ids: vec!["t-1".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("0 recorded step(s)"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn test_hint_for_missing_credentials() {
        let err = DubalignError::Engine("MINIMAX_API_KEY env var not set".into());
        assert!(err.hint().unwrap().contains("MINIMAX_API_KEY"));
    }

    #[test]
    fn test_hint_for_invalid_max_speed() {
        let err = DubalignError::InvalidConfig("alignment.max_speed = 3 is out of range".into());
        assert!(err.hint().unwrap().contains("1.2"));
        assert!(DubalignError::Other("x".into()).hint().is_none());
    }
}
