pub mod minimax;
pub mod native;
pub mod throttle;

use crate::align::types::{AudioHandle, VocabularyEntry};
use crate::config::Config;
use crate::error::{DubalignError, DubalignResult, ShorteningError, SynthesisError};
use std::time::Duration;
use throttle::Throttled;

/// One text-to-speech call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub voice_id: &'a str,
    pub speed: f64,
    pub emotion: &'a str,
    pub language_boost: &'a str,
    pub model: &'a str,
}

/// Successful synthesis: where the audio lives and the backend's trace id.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub audio_handle: AudioHandle,
    pub trace_id: String,
}

/// One text-condensation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ShorteningRequest<'a> {
    pub original_text: &'a str,
    pub current_text: &'a str,
    pub target_language: &'a str,
    pub target_char_count: usize,
    pub custom_vocabulary: &'a [VocabularyEntry],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shortened {
    pub text: String,
    pub trace_id: String,
}

/// Trait for pluggable TTS backends.
///
/// Implementations are synchronous; a call blocks until the audio handle exists.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Synthesized, SynthesisError>;

    fn engine_name(&self) -> &str;
}

/// Trait for backends that condense a translation to a character budget.
pub trait TextShortener: Send + Sync {
    fn shorten(&self, request: &ShorteningRequest<'_>) -> Result<Shortened, ShorteningError>;
}

fn interval(secs: f64) -> Duration {
    Duration::from_secs_f64(secs.max(0.0))
}

/// Factory: create the configured synthesizer, wrapped in its rate limiter.
pub fn create_synthesizer(config: &Config) -> DubalignResult<Box<dyn SpeechSynthesizer>> {
    match config.synthesis.engine.as_str() {
        "minimax" => {
            let client = minimax::MiniMaxClient::from_env(config)?;
            Ok(Box::new(Throttled::new(client, "tts", interval(config.rate_limit.tts_interval_secs))))
        }
        "native" => {
            let engine = native::NativeTtsEngine::new(&config.synthesis.output_dir)?;
            Ok(Box::new(engine))
        }
        other => Err(DubalignError::Engine(format!(
            "Unknown synthesis engine: '{other}'. Supported: minimax, native"
        ))),
    }
}

/// Factory: create the configured shortener, or `None` when shortening is off.
pub fn create_shortener(config: &Config) -> DubalignResult<Option<Box<dyn TextShortener>>> {
    if !config.shortening.enabled {
        return Ok(None);
    }
    let client = minimax::MiniMaxClient::from_env(config)?;
    let throttled = Throttled::new(client, "llm", interval(config.rate_limit.llm_interval_secs));
    Ok(Some(Box::new(throttled)))
}
