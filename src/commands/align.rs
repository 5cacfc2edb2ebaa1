use colored::*;
use dubalign::align::policy::{MAX_MAX_SPEED, MIN_MAX_SPEED};
use dubalign::align::types::{AlignmentRequest, AlignmentResult};
use dubalign::batch::{Pipeline, RequestDefaults};
use dubalign::config::Config;
use dubalign::error::{DubalignError, DubalignResult};
use std::path::Path;

/// Command-line overrides for a single alignment.
pub struct AlignOptions {
    pub text: String,
    pub target: f64,
    pub original: Option<String>,
    pub voice: Option<String>,
    pub emotion: Option<String>,
    pub max_speed: Option<f64>,
}

/// Build the request from project defaults plus command-line overrides.
/// An override is held to the same `max_speed` range as `dubalign.toml`.
pub fn build_request(config: &Config, opts: AlignOptions) -> DubalignResult<AlignmentRequest> {
    let defaults = RequestDefaults::from_config(config);
    let mut request = defaults.request(
        &opts.text,
        opts.target,
        opts.original.as_deref().unwrap_or_default(),
    );
    if let Some(voice) = opts.voice {
        request.voice_id = voice;
    }
    if let Some(emotion) = opts.emotion {
        request.emotion = emotion;
    }
    if let Some(max_speed) = opts.max_speed {
        if !(MIN_MAX_SPEED..=MAX_MAX_SPEED).contains(&max_speed) {
            return Err(DubalignError::InvalidConfig(format!(
                "max_speed = {max_speed} (from --max-speed) is out of range"
            )));
        }
        request.max_speed = max_speed;
    }
    Ok(request)
}

pub async fn run(project: &Path, opts: AlignOptions) -> DubalignResult<()> {
    let config = super::load_project(project)?;
    let request = build_request(&config, opts)?;
    let pipeline = Pipeline::from_config(&config)?;

    let result = tokio::task::spawn_blocking(move || pipeline.controller().align(&request))
        .await
        .map_err(|e| DubalignError::Other(format!("alignment task failed: {e}")))??;

    print_summary(&result);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn print_summary(result: &AlignmentResult) {
    if result.success {
        eprintln!(
            "{} fitted in {} step(s): {:.3}s at speed {:.2}",
            "done:".green().bold(),
            result.steps.len(),
            result.final_duration,
            result.speed
        );
    } else {
        eprintln!(
            "{} could not fit the budget after {} step(s); render this segment as silence",
            "gave up:".yellow().bold(),
            result.steps.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> AlignOptions {
        AlignOptions {
            text: "你好世界".into(),
            target: 1.2,
            original: None,
            voice: None,
            emotion: None,
            max_speed: None,
        }
    }

    #[test]
    fn test_build_request_uses_project_defaults() {
        let mut config = Config::default();
        config.synthesis.default_voice = "female-shaonv".into();
        config.alignment.max_speed = 1.6;
        config.project.target_language = "English".into();

        let request = build_request(&config, opts()).unwrap();
        assert_eq!(request.text, "你好世界");
        assert_eq!(request.target_duration, 1.2);
        assert_eq!(request.voice_id, "female-shaonv");
        assert_eq!(request.max_speed, 1.6);
        assert_eq!(request.target_language, "English");
        assert_eq!(request.language_boost, "English");
        assert!(request.original_text.is_empty());
    }

    #[test]
    fn test_build_request_applies_overrides() {
        let request = build_request(
            &Config::default(),
            AlignOptions {
                original: Some("Hello world".into()),
                voice: Some("v2".into()),
                emotion: Some("sad".into()),
                max_speed: Some(1.4),
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(request.original_text, "Hello world");
        assert_eq!(request.voice_id, "v2");
        assert_eq!(request.emotion, "sad");
        assert_eq!(request.max_speed, 1.4);
    }

    #[test]
    fn test_build_request_rejects_out_of_range_max_speed() {
        for max_speed in [1.0, 2.5, f64::NAN] {
            let err = build_request(
                &Config::default(),
                AlignOptions {
                    max_speed: Some(max_speed),
                    ..opts()
                },
            )
            .unwrap_err();
            assert!(matches!(err, DubalignError::InvalidConfig(_)));
            assert!(err.hint().unwrap().contains("1.2"));
        }
    }

    #[test]
    fn test_build_request_accepts_range_bounds() {
        for max_speed in [MIN_MAX_SPEED, MAX_MAX_SPEED] {
            let request = build_request(
                &Config::default(),
                AlignOptions {
                    max_speed: Some(max_speed),
                    ..opts()
                },
            )
            .unwrap();
            assert_eq!(request.max_speed, max_speed);
        }
    }
}
