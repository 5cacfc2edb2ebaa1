use colored::*;
use dubalign::batch::{
    load_segments, run_batch, segments_from_subtitles, BatchReport, Pipeline, RequestDefaults,
    Segment,
};
use dubalign::config::Config;
use dubalign::duration::TrimmedDurationAnalyzer;
use dubalign::error::{DubalignError, DubalignResult};
use dubalign::subtitle::load_srt;
use dubalign::track::{assemble_track, write_wav};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub enum BatchInput {
    Json(PathBuf),
    Subtitles {
        original: PathBuf,
        translated: PathBuf,
    },
}

pub fn load_input(input: &BatchInput) -> DubalignResult<Vec<Segment>> {
    match input {
        BatchInput::Json(path) => load_segments(path),
        BatchInput::Subtitles {
            original,
            translated,
        } => segments_from_subtitles(&load_srt(original)?, &load_srt(translated)?),
    }
}

pub async fn run(
    project: &Path,
    input: BatchInput,
    parallel: usize,
    output: Option<&Path>,
    track: Option<&Path>,
) -> DubalignResult<()> {
    let config = super::load_project(project)?;
    let segments = load_input(&input)?;
    eprintln!(
        "{} {} segment(s), {} at a time",
        "aligning:".cyan().bold(),
        segments.len(),
        parallel.max(1)
    );

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let defaults = RequestDefaults::from_config(&config);
    let report = run_batch(pipeline, segments.clone(), &defaults, parallel).await;

    write_report(&report, output)?;
    eprintln!(
        "{} {}/{} segment(s) aligned, {} failed",
        "done:".green().bold(),
        report.success,
        report.total,
        report.failed
    );

    if let Some(path) = track {
        write_track(&config, segments, report, path.to_path_buf()).await?;
        eprintln!("  dubbed track written to {}", path.display());
    }
    Ok(())
}

/// Lay every aligned segment's audio onto one WAV at its subtitle start.
async fn write_track(
    config: &Config,
    segments: Vec<Segment>,
    report: BatchReport,
    path: PathBuf,
) -> DubalignResult<()> {
    let analyzer = TrimmedDurationAnalyzer::new(
        config.alignment.silence_threshold_db,
        Duration::from_secs_f64(config.alignment.request_timeout_secs),
    );
    tokio::task::spawn_blocking(move || {
        let audio = assemble_track(&segments, &report, |handle| analyzer.load(handle));
        write_wav(&path, &audio)
    })
    .await
    .map_err(|e| DubalignError::Other(format!("track assembly task failed: {e}")))?
}

fn write_report(report: &BatchReport, output: Option<&Path>) -> DubalignResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!("  report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
