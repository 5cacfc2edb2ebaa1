use colored::*;
use dubalign::config::{save_config, Config, CONFIG_FILE};
use dubalign::error::{DubalignError, DubalignResult};
use std::path::Path;

const ENV_EXAMPLE: &str = "# Credentials for the minimax engine. Copy to .env and fill in.
MINIMAX_API_KEY=
MINIMAX_GROUP_ID=
";

/// Write a default `dubalign.toml` (and a `.env.example`) into `path`.
/// Returns the files written, relative to `path`.
pub fn create_project(path: &Path) -> DubalignResult<Vec<String>> {
    let config_path = path.join(CONFIG_FILE);
    if config_path.exists() {
        return Err(DubalignError::AlreadyInitialized(config_path));
    }

    std::fs::create_dir_all(path)?;
    save_config(path, &Config::default())?;
    let mut files = vec![CONFIG_FILE.to_string()];

    let env_example = path.join(".env.example");
    if !env_example.exists() {
        std::fs::write(&env_example, ENV_EXAMPLE)?;
        files.push(".env.example".to_string());
    }
    Ok(files)
}

pub fn run(path: &Path) -> DubalignResult<()> {
    let files = create_project(path)?;

    eprintln!(
        "{} Initialized dubalign project at {}",
        "done:".green().bold(),
        path.display()
    );
    for file in &files {
        eprintln!("  {file}");
    }
    eprintln!();
    eprintln!(
        "Next: put your MiniMax credentials in {}, then run:",
        ".env".cyan()
    );
    eprintln!("  dubalign -p {} align --text \"你好世界\" --target 1.0", path.display());

    Ok(())
}
