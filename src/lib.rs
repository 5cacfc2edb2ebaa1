//! Duration-constrained speech synthesis for dubbing.
//!
//! [`align::AlignmentController`] fits a translated line into the time slot of
//! the original speech by walking a fixed ladder of attempts (re-synthesis,
//! LLM shortening, speed correction) against pluggable synthesis, shortening
//! and duration-measurement backends. [`batch`] drives many segments at once
//! and [`track`] lays the results out as one dubbed audio track.

pub mod align;
pub mod batch;
pub mod config;
pub mod duration;
pub mod error;
pub mod subtitle;
pub mod track;
pub mod tts;
