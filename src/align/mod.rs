//! The duration-constrained synthesis controller.
//!
//! One alignment walks a fixed, strictly forward ladder of attempts:
//! initial synthesis, text shortening, speed correction, speed increase, and a
//! maximum-speed attempt. The first attempt whose silence-trimmed duration fits
//! the target wins; if none does, a give-up record closes the trace and the
//! caller renders the segment as silence.

pub mod policy;
pub mod types;

use crate::duration::DurationAnalyzer;
use crate::error::{AlignError, AlignFailure};
use crate::tts::{ShorteningRequest, SpeechSynthesizer, SynthesisRequest, TextShortener};
use policy::compute_policy;
use tracing::{debug, info, warn};
use types::{
    round2, AlignmentRequest, AlignmentResult, AudioHandle, OptimizationStep, StepAction,
};

/// Orchestrates one alignment over borrowed collaborators. Holds no state
/// between calls, so one controller can serve many threads.
pub struct AlignmentController<'a> {
    synthesizer: &'a dyn SpeechSynthesizer,
    shortener: Option<&'a dyn TextShortener>,
    analyzer: &'a dyn DurationAnalyzer,
}

/// The most recent measured attempt.
struct Attempt {
    audio_handle: AudioHandle,
    duration: f64,
}

/// Per-invocation scratch state: current text, last measurement and the trace.
struct Run<'r> {
    request: &'r AlignmentRequest,
    text: String,
    speed: f64,
    duration: f64,
    steps: Vec<OptimizationStep>,
    trace_ids: Vec<String>,
}

impl<'r> Run<'r> {
    fn new(request: &'r AlignmentRequest) -> Self {
        Self {
            request,
            text: request.text.clone(),
            speed: 1.0,
            duration: 0.0,
            steps: Vec::with_capacity(6),
            trace_ids: Vec::new(),
        }
    }

    fn ratio(&self) -> f64 {
        self.duration / self.request.target_duration
    }

    fn fits(&self) -> bool {
        self.duration <= self.request.target_duration
    }

    fn record(&mut self, action: StepAction) {
        let succeeded = action != StepAction::GaveUp && self.fits();
        let step = OptimizationStep {
            step_number: self.steps.len() as u32 + 1,
            action,
            text_snapshot: self.text.clone(),
            speed: self.speed,
            measured_duration: self.duration,
            ratio: self.ratio(),
            succeeded,
        };
        info!(
            "Step {} ({}): speed={:.2} duration={:.3}s target={:.3}s ratio={:.2}",
            step.step_number,
            action,
            step.speed,
            step.measured_duration,
            self.request.target_duration,
            step.ratio
        );
        self.steps.push(step);
    }

    fn abort(self, kind: impl Into<AlignFailure>) -> AlignError {
        let kind = kind.into();
        warn!(
            "Alignment aborted after {} step(s): {}",
            self.steps.len(),
            kind
        );
        AlignError {
            kind,
            steps: self.steps,
            trace_ids: self.trace_ids,
        }
    }

    fn succeed(self, audio_handle: AudioHandle) -> AlignmentResult {
        let step_number = self.steps.len();
        info!("Alignment succeeded at step {step_number}");
        AlignmentResult {
            success: true,
            audio_handle: Some(audio_handle),
            final_duration: self.duration,
            ratio: self.ratio(),
            speed: self.speed,
            optimized_text: self.text,
            steps: self.steps,
            trace_ids: self.trace_ids,
        }
    }

    fn give_up(mut self) -> AlignmentResult {
        warn!("All alignment attempts failed; segment will be rendered as silence");
        self.record(StepAction::GaveUp);
        AlignmentResult {
            success: false,
            audio_handle: None,
            final_duration: 0.0,
            ratio: self.ratio(),
            speed: self.speed,
            optimized_text: self.text,
            steps: self.steps,
            trace_ids: self.trace_ids,
        }
    }
}

impl<'a> AlignmentController<'a> {
    pub fn new(
        synthesizer: &'a dyn SpeechSynthesizer,
        shortener: Option<&'a dyn TextShortener>,
        analyzer: &'a dyn DurationAnalyzer,
    ) -> Self {
        Self {
            synthesizer,
            shortener,
            analyzer,
        }
    }

    /// Fit `request.text` into `request.target_duration`.
    ///
    /// Returns `Ok` for both terminal states (success and give-up). Synthesis
    /// and measurement failures abort immediately with the partial trace.
    pub fn align(&self, request: &AlignmentRequest) -> Result<AlignmentResult, AlignError> {
        let mut run = Run::new(request);

        if !(request.target_duration.is_finite() && request.target_duration > 0.0) {
            return Err(run.abort(AlignFailure::InvalidRequest(format!(
                "target_duration must be a positive number of seconds, got {}",
                request.target_duration
            ))));
        }

        let policy = compute_policy(request.max_speed);
        let ceiling = policy.step5_speed;
        info!(
            "Aligning '{}' to {:.3}s (max_speed={}, policy={:?})",
            request.text, request.target_duration, request.max_speed, policy
        );

        // Step 1: initial synthesis at normal speed.
        let attempt = match self.attempt(&mut run) {
            Ok(a) => a,
            Err(kind) => return Err(run.abort(kind)),
        };
        run.record(StepAction::InitialSynthesis);
        if run.fits() {
            return Ok(run.succeed(attempt.audio_handle));
        }

        // Step 2: shorten the translation, budgeted from the step-1 measurement.
        match self.shorten(&mut run, attempt.duration) {
            Ok(Some(attempt)) => {
                run.record(StepAction::TextShortened);
                if run.fits() {
                    return Ok(run.succeed(attempt.audio_handle));
                }
            }
            Ok(None) => {}
            Err(kind) => return Err(run.abort(kind)),
        }

        // Steps 3-5: speed up from the latest measurement.
        for action in [
            StepAction::SpeedAdjusted,
            StepAction::SpeedIncreased,
            StepAction::MaxSpeedAttempt,
        ] {
            run.speed = match action {
                StepAction::SpeedAdjusted => {
                    round2(run.ratio() + policy.step3_increment).min(ceiling)
                }
                StepAction::SpeedIncreased => {
                    round2(run.speed + policy.step4_increment).min(ceiling)
                }
                _ => policy.step5_speed,
            };
            let attempt = match self.attempt(&mut run) {
                Ok(a) => a,
                Err(kind) => return Err(run.abort(kind)),
            };
            run.record(action);
            if run.fits() {
                return Ok(run.succeed(attempt.audio_handle));
            }
        }

        Ok(run.give_up())
    }

    /// Synthesize the current text at the current speed and measure it.
    fn attempt(&self, run: &mut Run<'_>) -> Result<Attempt, AlignFailure> {
        let request = run.request;
        let synthesized = self.synthesizer.synthesize(&SynthesisRequest {
            text: &run.text,
            voice_id: &request.voice_id,
            speed: run.speed,
            emotion: &request.emotion,
            language_boost: &request.language_boost,
            model: &request.model,
        });
        let synthesized = match synthesized {
            Ok(s) => s,
            Err(e) => {
                if let Some(trace_id) = &e.trace_id {
                    run.trace_ids.push(trace_id.clone());
                }
                return Err(e.into());
            }
        };
        run.trace_ids.push(synthesized.trace_id);
        debug!("Synthesized audio: {}", synthesized.audio_handle);

        let duration = self.analyzer.measure_duration(&synthesized.audio_handle)?;
        run.duration = duration;
        Ok(Attempt {
            audio_handle: synthesized.audio_handle,
            duration,
        })
    }

    /// Step 2. `Ok(None)` means shortening was skipped or produced nothing
    /// usable, and the run continues with the unchanged text.
    fn shorten(
        &self,
        run: &mut Run<'_>,
        step1_duration: f64,
    ) -> Result<Option<Attempt>, AlignFailure> {
        let request = run.request;
        let Some(shortener) = self.shortener else {
            debug!("No shortener configured, skipping text shortening");
            return Ok(None);
        };
        if request.original_text.trim().is_empty() {
            debug!("No original text, skipping text shortening");
            return Ok(None);
        }

        let target_char_count = target_char_count(&run.text, request.target_duration, step1_duration);
        info!(
            "Shortening '{}' from {} to under {} chars",
            run.text,
            run.text.chars().count(),
            target_char_count
        );

        let shortened = shortener.shorten(&ShorteningRequest {
            original_text: &request.original_text,
            current_text: &run.text,
            target_language: &request.target_language,
            target_char_count,
            custom_vocabulary: &request.custom_vocabulary,
        });
        let shortened = match shortened {
            Ok(s) => s,
            Err(e) => {
                if let Some(trace_id) = e.trace_id.clone() {
                    run.trace_ids.push(trace_id);
                }
                warn!("{e}; continuing with the unshortened text");
                return Ok(None);
            }
        };
        run.trace_ids.push(shortened.trace_id);

        let text = shortened.text.trim();
        if text.is_empty() || text == run.text {
            warn!("Shortening returned no usable text; continuing with the unshortened text");
            return Ok(None);
        }

        run.text = text.to_string();
        run.speed = 1.0;
        self.attempt(run).map(Some)
    }
}

/// `floor(chars(text) * target / measured)`, the character budget for shortening.
pub fn target_char_count(text: &str, target_duration: f64, measured_duration: f64) -> usize {
    if measured_duration <= 0.0 {
        return text.chars().count();
    }
    (text.chars().count() as f64 * target_duration / measured_duration).floor() as usize
}
