use colored::*;
use dubalign::align::policy::{compute_policy, MAX_MAX_SPEED, MIN_MAX_SPEED};
use dubalign::error::DubalignResult;

pub fn run(max_speed: f64) -> DubalignResult<()> {
    if !(MIN_MAX_SPEED..=MAX_MAX_SPEED).contains(&max_speed) {
        eprintln!(
            "{} max_speed {max_speed} is outside [{MIN_MAX_SPEED}, {MAX_MAX_SPEED}], clamped",
            "warning:".yellow().bold()
        );
    }
    let policy = compute_policy(max_speed);
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}
