use crate::align::types::{AudioHandle, VocabularyEntry};
use crate::config::Config;
use crate::error::{DubalignError, DubalignResult, ShorteningError, SynthesisError};
use crate::tts::{
    Shortened, ShorteningRequest, SpeechSynthesizer, Synthesized, SynthesisRequest, TextShortener,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const TRACE_HEADER: &str = "Trace-ID";
const MISSING_TRACE: &str = "N/A";

const SHORTEN_SYSTEM_PROMPT: &str =
    "你是一个翻译优化专家，你必须严格按照指定的字符数要求进行文本缩短，不能超出范围。";

/// MiniMax cloud client: text-to-speech (`/v1/t2a_v2`) and LLM shortening
/// (`/v1/text/chatcompletion_v2`).
///
/// Requires `MINIMAX_API_KEY` and `MINIMAX_GROUP_ID` environment variables.
/// Rate limiting is not done here; wrap the client in [`crate::tts::throttle::Throttled`].
pub struct MiniMaxClient {
    agent: ureq::Agent,
    api_key: String,
    group_id: String,
    tts_base_url: String,
    llm_base_url: String,
    llm_model: String,
}

impl MiniMaxClient {
    pub fn from_env(config: &Config) -> DubalignResult<Self> {
        let api_key = require_env("MINIMAX_API_KEY")?;
        let group_id = require_env("MINIMAX_GROUP_ID")?;
        Ok(Self::new(api_key, group_id, config))
    }

    pub fn new(api_key: String, group_id: String, config: &Config) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs_f64(
                config.alignment.request_timeout_secs.max(1.0),
            )))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            api_key,
            group_id,
            tts_base_url: config.synthesis.base_url.trim_end_matches('/').to_string(),
            llm_base_url: config.shortening.base_url.trim_end_matches('/').to_string(),
            llm_model: config.shortening.model.clone(),
        }
    }

    /// POST a JSON body, returning the trace id and response text. Failures carry
    /// a message and whatever trace id the backend sent.
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(Option<String>, String), (String, Option<String>)> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body.to_string().as_bytes())
            .map_err(|e| (format!("request to {url} failed: {e}"), None))?;

        let trace_id = response
            .headers()
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let status = response.status();
        debug!("MiniMax {} -> {} (Trace-ID: {:?})", url, status, trace_id);

        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| (format!("failed to read response body: {e}"), trace_id.clone()))?;

        if !status.is_success() {
            return Err((format!("HTTP {status}: {text}"), trace_id));
        }
        Ok((trace_id, text))
    }
}

fn require_env(name: &str) -> DubalignResult<String> {
    let value = std::env::var(name).map_err(|_| {
        DubalignError::Engine(format!(
            "{name} env var not set. Get your credentials from https://www.minimax.io"
        ))
    })?;
    if value.is_empty() {
        return Err(DubalignError::Engine(format!("{name} env var is empty")));
    }
    Ok(value)
}

impl SpeechSynthesizer for MiniMaxClient {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Synthesized, SynthesisError> {
        let preview: String = request.text.chars().take(30).collect();
        info!(
            "MiniMax TTS: '{}' voice={} speed={:.2}",
            preview, request.voice_id, request.speed
        );

        let url = format!("{}/v1/t2a_v2?GroupId={}", self.tts_base_url, self.group_id);
        let payload = tts_payload(request);

        let (header_trace, body) = self
            .post_json(&url, &payload)
            .map_err(|(message, trace_id)| SynthesisError { message, trace_id })?;

        let parsed = parse_tts_response(&body);
        let trace_id = header_trace
            .or_else(|| parsed.as_ref().ok().and_then(|(_, t)| t.clone()))
            .unwrap_or_else(|| MISSING_TRACE.to_string());

        match parsed {
            Ok((audio_url, _)) => Ok(Synthesized {
                audio_handle: AudioHandle::new(audio_url),
                trace_id,
            }),
            Err(message) => Err(SynthesisError {
                message,
                trace_id: Some(trace_id),
            }),
        }
    }

    fn engine_name(&self) -> &str {
        "minimax"
    }
}

impl TextShortener for MiniMaxClient {
    fn shorten(&self, request: &ShorteningRequest<'_>) -> Result<Shortened, ShorteningError> {
        info!(
            "MiniMax shortening: '{}' -> target {} chars",
            request.current_text, request.target_char_count
        );

        let url = format!("{}/v1/text/chatcompletion_v2", self.llm_base_url);
        let payload = serde_json::json!({
            "model": self.llm_model,
            "messages": [
                {"role": "system", "content": SHORTEN_SYSTEM_PROMPT},
                {"role": "user", "content": shortening_prompt(request)},
            ],
        });

        let (header_trace, body) = self
            .post_json(&url, &payload)
            .map_err(|(message, trace_id)| ShorteningError { message, trace_id })?;
        let trace_id = header_trace.unwrap_or_else(|| MISSING_TRACE.to_string());

        match parse_chat_response(&body) {
            Ok(text) => {
                info!("MiniMax shortening result: '{}'", text);
                Ok(Shortened { text, trace_id })
            }
            Err(message) => {
                warn!("MiniMax shortening response unusable: {}", message);
                Err(ShorteningError {
                    message,
                    trace_id: Some(trace_id),
                })
            }
        }
    }
}

/// Build the `/v1/t2a_v2` request body. An `auto` emotion is left to the backend.
fn tts_payload(request: &SynthesisRequest<'_>) -> serde_json::Value {
    let mut voice_setting = serde_json::json!({
        "voice_id": request.voice_id,
        "speed": request.speed,
    });
    if request.emotion != "auto" && !request.emotion.is_empty() {
        voice_setting["emotion"] = serde_json::Value::String(request.emotion.to_string());
    }
    serde_json::json!({
        "model": request.model,
        "text": request.text,
        "language_boost": request.language_boost,
        "output_format": "url",
        "voice_setting": voice_setting,
    })
}

/// Status block MiniMax attaches to every response; non-zero codes are failures.
#[derive(Deserialize)]
struct BaseResp {
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

#[derive(Deserialize)]
struct TtsData {
    audio: Option<String>,
}

#[derive(Deserialize)]
struct TtsResponse {
    data: Option<TtsData>,
    base_resp: Option<BaseResp>,
    trace_id: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    base_resp: Option<BaseResp>,
}

fn check_base_resp(base: Option<&BaseResp>) -> Result<(), String> {
    match base {
        Some(b) if b.status_code != 0 => Err(format!(
            "MiniMax status {}: {}",
            b.status_code, b.status_msg
        )),
        _ => Ok(()),
    }
}

/// Extract the audio URL (and body trace id, if any) from a t2a_v2 response.
fn parse_tts_response(body: &str) -> Result<(String, Option<String>), String> {
    let parsed: TtsResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed TTS response: {e}"))?;
    check_base_resp(parsed.base_resp.as_ref())?;
    match parsed.data.and_then(|d| d.audio) {
        Some(url) if !url.is_empty() => Ok((url, parsed.trace_id)),
        _ => Err(format!("TTS response has no audio: {body}")),
    }
}

/// Extract the first completion's trimmed content from a chatcompletion_v2 response.
fn parse_chat_response(body: &str) -> Result<String, String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed LLM response: {e}"))?;
    check_base_resp(parsed.base_resp.as_ref())?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| format!("LLM response has no choices: {body}"))?;
    Ok(choice.message.content.trim().to_string())
}

/// Render the vocabulary as `序号{index}，{term}，{translation}；` entries.
fn vocabulary_string(vocabulary: &[VocabularyEntry]) -> String {
    vocabulary
        .iter()
        .map(|v| format!("序号{}，{}，{}；", v.index, v.term, v.translation))
        .collect()
}

fn shortening_prompt(request: &ShorteningRequest<'_>) -> String {
    let current_chars = request.current_text.chars().count();
    let vocab = vocabulary_string(request.custom_vocabulary);

    let mut prompt = format!(
        "你的任务是翻译优化，原文\"{}\"当前\"{}\"翻译\"{}\"，要求：\n",
        request.original_text, request.target_language, request.current_text
    );
    prompt.push_str("1. 保持口语化表达\n");
    if !vocab.is_empty() {
        prompt.push_str(&format!(
            "2. 如果包含以下专有词汇，请按照词表翻译，词表{vocab}\n"
        ));
    }
    prompt.push_str(&format!(
        "3. 当前字符数是{}个字，需要精简成少于{}个字，\n",
        current_chars, request.target_char_count
    ));
    prompt.push_str(&format!(
        "请直接输出新的\"{}\"翻译如下：",
        request.target_language
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesis_request(emotion: &'static str) -> SynthesisRequest<'static> {
        SynthesisRequest {
            text: "师傅您好,我是小明",
            voice_id: "male-qn-qingse",
            speed: 1.2,
            emotion,
            language_boost: "Chinese",
            model: "speech-01-turbo",
        }
    }

    #[test]
    fn test_tts_payload_omits_auto_emotion() {
        let payload = tts_payload(&synthesis_request("auto"));
        assert_eq!(payload["model"], "speech-01-turbo");
        assert_eq!(payload["output_format"], "url");
        assert_eq!(payload["voice_setting"]["voice_id"], "male-qn-qingse");
        assert_eq!(payload["voice_setting"]["speed"], 1.2);
        assert!(payload["voice_setting"].get("emotion").is_none());
    }

    #[test]
    fn test_tts_payload_includes_explicit_emotion() {
        let payload = tts_payload(&synthesis_request("happy"));
        assert_eq!(payload["voice_setting"]["emotion"], "happy");
    }

    #[test]
    fn test_parse_tts_response_ok() {
        let body = r#"{
            "data": {"audio": "https://cdn.minimax.example/a.mp3", "status": 2},
            "trace_id": "04ece790375f3ca2edbb44e8c4c200bf",
            "base_resp": {"status_code": 0, "status_msg": "success"}
        }"#;
        let (url, trace) = parse_tts_response(body).unwrap();
        assert_eq!(url, "https://cdn.minimax.example/a.mp3");
        assert_eq!(trace.as_deref(), Some("04ece790375f3ca2edbb44e8c4c200bf"));
    }

    #[test]
    fn test_parse_tts_response_status_error() {
        let body = r#"{"data": null, "base_resp": {"status_code": 1002, "status_msg": "rate limit"}}"#;
        let err = parse_tts_response(body).unwrap_err();
        assert!(err.contains("1002"), "got: {err}");
        assert!(err.contains("rate limit"), "got: {err}");
    }

    #[test]
    fn test_parse_tts_response_missing_audio() {
        assert!(parse_tts_response(r#"{"data": {}}"#).is_err());
        assert!(parse_tts_response("not json at all").is_err());
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "  你好世界  "}}],
            "base_resp": {"status_code": 0, "status_msg": ""}
        }"#;
        assert_eq!(parse_chat_response(body).unwrap(), "你好世界");
        assert!(parse_chat_response(r#"{"choices": []}"#).is_err());
    }

    #[test]
    fn test_vocabulary_string() {
        let vocab = vec![
            VocabularyEntry {
                index: 1,
                term: "小明".into(),
                translation: "Xiaoming".into(),
            },
            VocabularyEntry {
                index: 2,
                term: "北京".into(),
                translation: "Beijing".into(),
            },
        ];
        assert_eq!(
            vocabulary_string(&vocab),
            "序号1，小明，Xiaoming；序号2，北京，Beijing；"
        );
        assert_eq!(vocabulary_string(&[]), "");
    }

    #[test]
    fn test_shortening_prompt_counts_chars() {
        let request = ShorteningRequest {
            original_text: "Hello world, nice to meet you",
            current_text: "你好世界，很高兴认识你",
            target_language: "中文",
            target_char_count: 7,
            custom_vocabulary: &[],
        };
        let prompt = shortening_prompt(&request);
        assert!(prompt.contains("当前字符数是11个字"), "got: {prompt}");
        assert!(prompt.contains("少于7个字"));
        assert!(!prompt.contains("词表"));
    }

    #[test]
    fn test_from_env_missing_key() {
        let prev = std::env::var("MINIMAX_API_KEY").ok();
        std::env::remove_var("MINIMAX_API_KEY");

        let result = MiniMaxClient::from_env(&Config::default());
        let err_msg = result.err().unwrap().to_string();
        assert!(
            err_msg.contains("MINIMAX_API_KEY"),
            "Error should mention MINIMAX_API_KEY, got: {err_msg}"
        );

        if let Some(val) = prev {
            std::env::set_var("MINIMAX_API_KEY", val);
        }
    }
}
