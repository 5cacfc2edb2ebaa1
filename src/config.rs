use crate::align::policy::{MAX_MAX_SPEED, MIN_MAX_SPEED};
use crate::align::types::{language_boost_for, VocabularyEntry};
use crate::error::{DubalignError, DubalignResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up inside a project directory.
pub const CONFIG_FILE: &str = "dubalign.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub shortening: ShorteningConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthesisConfig {
    /// `minimax` or `native`.
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub default_voice: String,
    /// `auto` leaves the emotion to the backend.
    #[serde(default = "default_emotion")]
    pub emotion: String,
    /// Where local engines write their audio files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShorteningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlignmentConfig {
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f64,
    /// Timeout for each HTTP request, including audio downloads.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_tts_interval")]
    pub tts_interval_secs: f64,
    #[serde(default = "default_llm_interval")]
    pub llm_interval_secs: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Explicit MiniMax `language_boost`; derived from `target_language` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_boost: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_vocabulary: Vec<VocabularyEntry>,
}

impl ProjectConfig {
    pub fn language_boost(&self) -> String {
        match &self.language_boost {
            Some(boost) => boost.clone(),
            None => language_boost_for(&self.target_language).to_string(),
        }
    }
}

// Defaults
fn default_engine() -> String {
    "minimax".into()
}
fn default_base_url() -> String {
    "https://api.minimax.chat".into()
}
fn default_tts_model() -> String {
    crate::align::types::default_model()
}
fn default_voice() -> String {
    "male-qn-qingse".into()
}
fn default_emotion() -> String {
    crate::align::types::default_emotion()
}
fn default_output_dir() -> String {
    "./dubalign-audio".into()
}
fn default_true() -> bool {
    true
}
fn default_llm_model() -> String {
    "MiniMax-Text-01".into()
}
fn default_max_speed() -> f64 {
    crate::align::types::default_max_speed()
}
fn default_silence_threshold_db() -> f64 {
    crate::duration::DEFAULT_SILENCE_THRESHOLD_DB
}
fn default_request_timeout_secs() -> f64 {
    30.0
}
fn default_tts_interval() -> f64 {
    3.0
}
fn default_llm_interval() -> f64 {
    1.0
}
fn default_target_language() -> String {
    crate::align::types::default_target_language()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            base_url: default_base_url(),
            model: default_tts_model(),
            default_voice: default_voice(),
            emotion: default_emotion(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for ShorteningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            model: default_llm_model(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            silence_threshold_db: default_silence_threshold_db(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tts_interval_secs: default_tts_interval(),
            llm_interval_secs: default_llm_interval(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            language_boost: None,
            custom_vocabulary: Vec::new(),
        }
    }
}

impl Config {
    /// Reject values the controller and clients cannot work with.
    pub fn validate(&self) -> DubalignResult<()> {
        let max_speed = self.alignment.max_speed;
        if !(MIN_MAX_SPEED..=MAX_MAX_SPEED).contains(&max_speed) {
            return Err(DubalignError::InvalidConfig(format!(
                "alignment.max_speed = {max_speed} is out of range"
            )));
        }
        let threshold = self.alignment.silence_threshold_db;
        if !threshold.is_finite() || threshold >= 0.0 {
            return Err(DubalignError::InvalidConfig(format!(
                "alignment.silence_threshold_db = {threshold} must be a negative dBFS value"
            )));
        }
        let timeout = self.alignment.request_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(DubalignError::InvalidConfig(
                "alignment.request_timeout_secs must be positive".into(),
            ));
        }
        for (name, value) in [
            ("rate_limit.tts_interval_secs", self.rate_limit.tts_interval_secs),
            ("rate_limit.llm_interval_secs", self.rate_limit.llm_interval_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DubalignError::InvalidConfig(format!(
                    "{name} = {value} must be zero or positive"
                )));
            }
        }
        Ok(())
    }
}

/// Save a `Config` to `project_path/dubalign.toml`.
pub fn save_config(project_path: &Path, config: &Config) -> DubalignResult<()> {
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| DubalignError::ConfigParse(e.to_string()))?;
    std::fs::write(project_path.join(CONFIG_FILE), toml_str)?;
    Ok(())
}

pub fn load_config(project_path: &Path) -> DubalignResult<Config> {
    let config_path = project_path.join(CONFIG_FILE);
    if !config_path.exists() {
        return Err(DubalignError::ConfigNotFound(config_path));
    }
    let content = std::fs::read_to_string(&config_path)?;
    let config: Config =
        toml::from_str(&content).map_err(|e| DubalignError::ConfigParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[synthesis]
engine = "native"
default_voice = "zh"
emotion = "happy"
output_dir = "./audio"

[shortening]
enabled = false
model = "MiniMax-Text-02"

[alignment]
max_speed = 1.6
silence_threshold_db = -45.0

[rate_limit]
tts_interval_secs = 0.5
llm_interval_secs = 0.0

[project]
target_language = "English"
language_boost = "English,Chinese"

[[project.custom_vocabulary]]
index = 1
term = "大模型"
translation = "LLM"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.synthesis.engine, "native");
        assert_eq!(config.synthesis.emotion, "happy");
        assert!(!config.shortening.enabled);
        assert_eq!(config.alignment.max_speed, 1.6);
        assert_eq!(config.rate_limit.tts_interval_secs, 0.5);
        assert_eq!(config.project.target_language, "English");
        assert_eq!(config.project.language_boost(), "English,Chinese");
        assert_eq!(config.project.custom_vocabulary[0].term, "大模型");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.synthesis.engine, "minimax");
        assert_eq!(config.synthesis.base_url, "https://api.minimax.chat");
        assert_eq!(config.synthesis.model, "speech-01-turbo");
        assert_eq!(config.synthesis.emotion, "auto");
        assert!(config.shortening.enabled);
        assert_eq!(config.shortening.model, "MiniMax-Text-01");
        assert_eq!(config.alignment.max_speed, 2.0);
        assert_eq!(config.alignment.silence_threshold_db, -50.0);
        assert_eq!(config.rate_limit.tts_interval_secs, 3.0);
        assert_eq!(config.rate_limit.llm_interval_secs, 1.0);
        assert_eq!(config.project.target_language, "中文");
        assert_eq!(config.project.language_boost, None);
        assert_eq!(config.project.language_boost(), "Chinese");
    }

    #[test]
    fn test_language_boost_follows_target_language() {
        let config: Config = toml::from_str("[project]\ntarget_language = \"en\"\n").unwrap();
        assert_eq!(config.project.language_boost(), "English");

        let config: Config = toml::from_str("[project]\ntarget_language = \"ja\"\n").unwrap();
        assert_eq!(config.project.language_boost(), "Japanese");

        let saved = toml::to_string_pretty(&config).unwrap();
        assert!(!saved.contains("language_boost"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = toml::from_str::<Config>("not valid toml [[[");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.alignment.max_speed = 2.5;
        assert!(matches!(config.validate(), Err(DubalignError::InvalidConfig(m)) if m.contains("max_speed")));

        let mut config = Config::default();
        config.alignment.max_speed = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.alignment.silence_threshold_db = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.llm_interval_secs = -1.0;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.synthesis.engine = "native".into();
        config.alignment.max_speed = 1.5;
        config.project.custom_vocabulary.push(VocabularyEntry {
            index: 1,
            term: "推理".into(),
            translation: "inference".into(),
        });
        save_config(dir.path(), &config).unwrap();

        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded.synthesis.engine, "native");
        assert_eq!(loaded.alignment.max_speed, 1.5);
        assert_eq!(loaded.project.custom_vocabulary, config.project.custom_vocabulary);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, DubalignError::ConfigNotFound(p) if p.ends_with(CONFIG_FILE)));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[alignment]\nmax_speed = 4.0\n").unwrap();
        assert!(matches!(
            load_config(dir.path()),
            Err(DubalignError::InvalidConfig(_))
        ));
    }
}
