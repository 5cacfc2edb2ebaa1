use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Opaque reference to synthesized audio: an http(s) URL or a local file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioHandle(String);

impl AudioHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Lower-cased file extension of the path part, ignoring any query string.
    pub fn extension(&self) -> Option<String> {
        let path = self.0.split(['?', '#']).next().unwrap_or(&self.0);
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a project's custom vocabulary, passed verbatim to the shortener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub index: u32,
    pub term: String,
    pub translation: String,
}

/// Input of one alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRequest {
    pub text: String,
    pub target_duration: f64,
    pub voice_id: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default)]
    pub custom_vocabulary: Vec<VocabularyEntry>,
    #[serde(default = "default_emotion")]
    pub emotion: String,
    #[serde(default = "default_language_boost")]
    pub language_boost: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

pub(crate) fn default_target_language() -> String {
    "中文".into()
}
pub(crate) fn default_emotion() -> String {
    "auto".into()
}
pub(crate) fn default_language_boost() -> String {
    "Chinese".into()
}

/// MiniMax `language_boost` for a target language given as a code (`en`) or a
/// name (`English`, `英文`). Unknown languages fall back to Chinese.
pub fn language_boost_for(target_language: &str) -> &'static str {
    match target_language.trim().to_lowercase().as_str() {
        "en" | "english" | "英文" | "英语" => "English",
        "yue" | "cantonese" | "粤语" => "Chinese,Yue",
        "ja" | "japanese" | "日文" | "日语" => "Japanese",
        "ko" | "korean" | "韩文" | "韩语" => "Korean",
        _ => "Chinese",
    }
}
pub(crate) fn default_model() -> String {
    "speech-01-turbo".into()
}
pub(crate) fn default_max_speed() -> f64 {
    2.0
}

impl AlignmentRequest {
    /// Request with the given text, budget and voice; everything else defaulted.
    pub fn new(text: impl Into<String>, target_duration: f64, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_duration,
            voice_id: voice_id.into(),
            original_text: String::new(),
            target_language: default_target_language(),
            custom_vocabulary: Vec::new(),
            emotion: default_emotion(),
            language_boost: default_language_boost(),
            model: default_model(),
            max_speed: default_max_speed(),
        }
    }
}

/// Strategy applied by one recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    InitialSynthesis,
    TextShortened,
    SpeedAdjusted,
    SpeedIncreased,
    MaxSpeedAttempt,
    GaveUp,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepAction::InitialSynthesis => "initial synthesis",
            StepAction::TextShortened => "text shortened",
            StepAction::SpeedAdjusted => "speed adjusted",
            StepAction::SpeedIncreased => "speed increased",
            StepAction::MaxSpeedAttempt => "max speed attempt",
            StepAction::GaveUp => "gave up",
        };
        f.write_str(name)
    }
}

/// One attempt in the alignment trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationStep {
    pub step_number: u32,
    pub action: StepAction,
    pub text_snapshot: String,
    pub speed: f64,
    pub measured_duration: f64,
    /// `measured_duration / target_duration` at full precision; serialized rounded.
    #[serde(serialize_with = "serialize_rounded")]
    pub ratio: f64,
    pub succeeded: bool,
}

/// Outcome of an alignment that ran to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentResult {
    pub success: bool,
    pub audio_handle: Option<AudioHandle>,
    pub final_duration: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub ratio: f64,
    pub speed: f64,
    pub optimized_text: String,
    pub steps: Vec<OptimizationStep>,
    pub trace_ids: Vec<String>,
}

/// Round to two decimals, the precision ratios and speeds are reported at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_rounded<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_boost_for() {
        assert_eq!(language_boost_for("en"), "English");
        assert_eq!(language_boost_for("English"), "English");
        assert_eq!(language_boost_for("英文"), "English");
        assert_eq!(language_boost_for("yue"), "Chinese,Yue");
        assert_eq!(language_boost_for("ja"), "Japanese");
        assert_eq!(language_boost_for("ko"), "Korean");
        assert_eq!(language_boost_for("中文"), "Chinese");
        assert_eq!(language_boost_for("zh"), "Chinese");
        assert_eq!(language_boost_for("fr"), "Chinese");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.4 + 0.2), 1.6);
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235_1), 1.24);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn test_audio_handle_remote_and_extension() {
        let url = AudioHandle::new("https://cdn.example.com/audio/abc.MP3?sig=xyz");
        assert!(url.is_remote());
        assert_eq!(url.extension().as_deref(), Some("mp3"));

        let path = AudioHandle::new("/tmp/out/segment-001.wav");
        assert!(!path.is_remote());
        assert_eq!(path.extension().as_deref(), Some("wav"));

        assert_eq!(AudioHandle::new("https://cdn.example.com/blob").extension(), None);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let json = r#"{"text": "你好", "target_duration": 1.5, "voice_id": "male-qn-qingse"}"#;
        let request: AlignmentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.emotion, "auto");
        assert_eq!(request.model, "speech-01-turbo");
        assert_eq!(request.max_speed, 2.0);
        assert!(request.original_text.is_empty());
        assert!(request.custom_vocabulary.is_empty());
    }

    #[test]
    fn test_step_serializes_rounded_ratio() {
        let step = OptimizationStep {
            step_number: 1,
            action: StepAction::InitialSynthesis,
            text_snapshot: "hi".into(),
            speed: 1.0,
            measured_duration: 1.4567,
            ratio: 1.4567,
            succeeded: false,
        };
        let v = serde_json::to_value(&step).unwrap();
        assert_eq!(v["ratio"], 1.46);
        assert_eq!(v["action"], "initial_synthesis");
        assert_eq!(step.ratio, 1.4567);
    }
}
