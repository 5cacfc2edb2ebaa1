use crate::align::types::AudioHandle;
use crate::error::{DubalignError, DubalignResult, SynthesisError};
use crate::tts::{SpeechSynthesizer, Synthesized, SynthesisRequest};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Offline TTS engine that shells out to platform-native commands:
/// - macOS: `say` (AIFF, converted to WAV via `ffmpeg`)
/// - Linux: `espeak-ng` (writes WAV directly)
///
/// Each call writes a new WAV into `output_dir`; the handle is that file's path.
pub struct NativeTtsEngine {
    platform: Platform,
    output_dir: PathBuf,
    counter: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum Platform {
    MacOS,
    Linux,
}

impl NativeTtsEngine {
    /// Create a new engine, verifying the platform command is available.
    pub fn new(output_dir: impl AsRef<Path>) -> DubalignResult<Self> {
        let platform = if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        };

        let cmd = match platform {
            Platform::MacOS => "say",
            Platform::Linux => "espeak-ng",
        };

        let check = Command::new("which")
            .arg(cmd)
            .output()
            .map_err(|e| DubalignError::Engine(format!("Failed to check for '{cmd}': {e}")))?;

        if !check.status.success() {
            return Err(DubalignError::Engine(format!(
                "TTS command '{cmd}' not found on this system"
            )));
        }

        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;

        Ok(Self {
            platform,
            output_dir,
            counter: AtomicU64::new(0),
        })
    }

    /// Next output file and the local trace id that names it.
    fn next_output(&self) -> (PathBuf, String) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let trace_id = format!("native-{}-{n:05}", std::process::id());
        (self.output_dir.join(format!("{trace_id}.wav")), trace_id)
    }
}

/// Convert a speed multiplier (1.0 = normal) to a words-per-minute rate.
fn platform_rate(platform: Platform, speed: f64) -> String {
    match platform {
        // macOS `say -r`: ~200 wpm is normal
        Platform::MacOS => ((speed * 200.0).round() as u32).to_string(),
        // espeak-ng `-s`: ~175 wpm is normal
        Platform::Linux => ((speed * 175.0).round() as u32).to_string(),
    }
}

impl SpeechSynthesizer for NativeTtsEngine {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Synthesized, SynthesisError> {
        let rate = platform_rate(self.platform, request.speed);
        let voice = Some(request.voice_id).filter(|v| !v.is_empty());
        let (output_path, trace_id) = self.next_output();
        debug!(
            "native TTS -> {} (rate {rate}, voice {:?})",
            output_path.display(),
            voice
        );

        let result = match self.platform {
            Platform::MacOS => synthesize_macos(request.text, voice, &rate, &output_path),
            Platform::Linux => synthesize_linux(request.text, voice, &rate, &output_path),
        };

        match result {
            Ok(()) => Ok(Synthesized {
                audio_handle: AudioHandle::new(output_path.display().to_string()),
                trace_id,
            }),
            Err(message) => Err(SynthesisError {
                message,
                trace_id: Some(trace_id),
            }),
        }
    }

    fn engine_name(&self) -> &str {
        "native"
    }
}

fn synthesize_macos(
    text: &str,
    voice: Option<&str>,
    rate: &str,
    output_path: &Path,
) -> Result<(), String> {
    let aiff_path = output_path.with_extension("aiff");

    let mut cmd = Command::new("say");
    if let Some(v) = voice {
        cmd.args(["-v", v]);
    }
    cmd.args(["-r", rate, "-o"]);
    cmd.arg(&aiff_path);
    cmd.arg("--");
    cmd.arg(text);

    let output = cmd
        .output()
        .map_err(|e| format!("Failed to run 'say': {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("'say' failed: {stderr}"));
    }

    let ffmpeg_output = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(&aiff_path)
        .args(["-acodec", "pcm_s16le", "-ar", "22050"])
        .arg(output_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("Failed to convert AIFF→WAV: {e}"));

    let _ = std::fs::remove_file(&aiff_path);
    let ffmpeg_output = ffmpeg_output?;

    if !ffmpeg_output.status.success() {
        let stderr = String::from_utf8_lossy(&ffmpeg_output.stderr);
        return Err(format!("FFmpeg AIFF→WAV conversion failed: {stderr}"));
    }
    Ok(())
}

fn synthesize_linux(
    text: &str,
    voice: Option<&str>,
    rate: &str,
    output_path: &Path,
) -> Result<(), String> {
    let mut cmd = Command::new("espeak-ng");
    if let Some(v) = voice {
        cmd.args(["-v", v]);
    }
    cmd.args(["-s", rate, "-w"]);
    cmd.arg(output_path);
    cmd.arg("--");
    cmd.arg(text);

    let output = cmd
        .output()
        .map_err(|e| format!("Failed to run 'espeak-ng': {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("'espeak-ng' failed: {stderr}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_rate() {
        assert_eq!(platform_rate(Platform::Linux, 1.0), "175");
        assert_eq!(platform_rate(Platform::Linux, 1.6), "280");
        assert_eq!(platform_rate(Platform::MacOS, 1.0), "200");
        assert_eq!(platform_rate(Platform::MacOS, 2.0), "400");
    }

    #[test]
    fn test_outputs_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        // Availability depends on the platform; only check naming when the engine exists.
        if let Ok(engine) = NativeTtsEngine::new(dir.path()) {
            let (a, ta) = engine.next_output();
            let (b, tb) = engine.next_output();
            assert_ne!(a, b);
            assert_ne!(ta, tb);
            assert!(a.starts_with(dir.path()));
            assert_eq!(a.extension().and_then(|e| e.to_str()), Some("wav"));
        }
    }
}
