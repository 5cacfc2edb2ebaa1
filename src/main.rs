mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command};
use colored::*;
use dubalign::error::DubalignResult;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing, gated on RUST_LOG env var
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "hint:".yellow().bold(), hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> DubalignResult<()> {
    let project = cli.project;
    match cli.command {
        Command::Init { path } => commands::init::run(path.as_deref().unwrap_or(project.as_path())),
        Command::Policy { max_speed } => commands::policy::run(max_speed),
        Command::Measure {
            handle,
            threshold_db,
        } => commands::measure::run(&project, &handle, threshold_db).await,
        Command::Align {
            text,
            target,
            original,
            voice,
            emotion,
            max_speed,
        } => {
            let opts = commands::align::AlignOptions {
                text,
                target,
                original,
                voice,
                emotion,
                max_speed,
            };
            commands::align::run(&project, opts).await
        }
        Command::Batch {
            segments,
            srt,
            translated,
            parallel,
            output,
            track,
        } => {
            let input = match (segments, srt, translated) {
                (Some(path), _, _) => commands::batch::BatchInput::Json(path),
                (None, Some(original), Some(translated)) => {
                    commands::batch::BatchInput::Subtitles {
                        original,
                        translated,
                    }
                }
                _ => {
                    return Err(dubalign::error::DubalignError::Other(
                        "No segments provided. Pass a JSON file or --srt with --translated.".into(),
                    ))
                }
            };
            commands::batch::run(&project, input, parallel, output.as_deref(), track.as_deref())
                .await
        }
    }
}
