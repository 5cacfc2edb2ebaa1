use crate::error::{DubalignError, DubalignResult};
use std::path::Path;
use tracing::warn;

/// A single subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

impl SubtitleEntry {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Parse an SRT timestamp "HH:MM:SS,mmm" into seconds.
pub fn parse_srt_time(s: &str) -> Option<f64> {
    let (hms, ms) = s.trim().split_once([',', '.'])?;
    let mut parts = hms.split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let sec: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || m >= 60 || sec >= 60 || ms.len() != 3 {
        return None;
    }
    let ms: u64 = ms.parse().ok()?;
    Some((h * 3600 + m * 60 + sec) as f64 + ms as f64 / 1000.0)
}

/// Parse SRT content into cues.
///
/// Blocks with fewer than three lines are skipped; a malformed timing line or a
/// cue that ends before it starts is an error. A non-numeric index falls back to
/// the block's position.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>, String> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    if content.trim().is_empty() {
        return Err("subtitle file is empty".into());
    }

    let mut entries = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut position = 0;
    for line in content.lines().chain(std::iter::once("")) {
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }
        position += 1;
        if let Some(entry) = parse_block(&block, position)? {
            entries.push(entry);
        }
        block.clear();
    }
    Ok(entries)
}

fn parse_block(lines: &[&str], position: usize) -> Result<Option<SubtitleEntry>, String> {
    if lines.len() < 3 {
        warn!("Skipping incomplete subtitle block {position}: {:?}", lines);
        return Ok(None);
    }

    let index = lines[0].trim().parse().unwrap_or_else(|_| {
        warn!("Subtitle block {position} has a bad index '{}'", lines[0].trim());
        position
    });

    let timing = lines[1];
    let (start, end) = timing
        .split_once("-->")
        .ok_or_else(|| format!("cue {index}: bad timing line '{timing}'"))?;
    let start_secs =
        parse_srt_time(start).ok_or_else(|| format!("cue {index}: bad start time '{}'", start.trim()))?;
    // Position settings may follow the end timestamp.
    let end = end.split_whitespace().next().unwrap_or_default();
    let end_secs = parse_srt_time(end).ok_or_else(|| format!("cue {index}: bad end time '{end}'"))?;
    if start_secs >= end_secs {
        return Err(format!(
            "cue {index}: start {start_secs:.3}s is not before end {end_secs:.3}s"
        ));
    }

    let text = lines[2..].join("\n").trim().to_string();
    Ok(Some(SubtitleEntry {
        index,
        start_secs,
        end_secs,
        text,
    }))
}

/// Read and parse an SRT file.
pub fn load_srt(path: &Path) -> DubalignResult<Vec<SubtitleEntry>> {
    let content = std::fs::read_to_string(path)?;
    parse_srt(&content).map_err(|message| DubalignError::SegmentParse {
        path: path.to_path_buf(),
        message,
    })
}
