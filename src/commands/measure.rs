use colored::*;
use dubalign::align::types::AudioHandle;
use dubalign::config::Config;
use dubalign::duration::{DurationAnalyzer, TrimmedDurationAnalyzer};
use dubalign::error::{DubalignError, DubalignResult};
use std::path::Path;
use std::time::Duration;

pub async fn run(project: &Path, handle: &str, threshold_db: Option<f64>) -> DubalignResult<()> {
    // Measuring works without a project; fall back to defaults.
    let config = match super::load_project(project) {
        Ok(config) => config,
        Err(DubalignError::ConfigNotFound(_)) => Config::default(),
        Err(e) => return Err(e),
    };
    let threshold_db = threshold_db.unwrap_or(config.alignment.silence_threshold_db);
    let analyzer = TrimmedDurationAnalyzer::new(
        threshold_db,
        Duration::from_secs_f64(config.alignment.request_timeout_secs),
    );

    let handle = AudioHandle::new(handle);
    let measured = {
        let handle = handle.clone();
        tokio::task::spawn_blocking(move || analyzer.measure_duration(&handle))
            .await
            .map_err(|e| DubalignError::Other(format!("measurement task failed: {e}")))??
    };

    eprintln!(
        "{} {} (silence below {threshold_db} dBFS trimmed)",
        "measured:".green().bold(),
        handle
    );
    println!("{measured:.3}");
    Ok(())
}
