pub mod align;
pub mod batch;
pub mod init;
pub mod measure;
pub mod policy;

use dubalign::config::{self, Config};
use dubalign::error::DubalignResult;
use std::path::Path;

/// Load `.env` (if any) and `dubalign.toml` from the project directory.
pub fn load_project(project_path: &Path) -> DubalignResult<Config> {
    let _ = dotenvy::from_path(project_path.join(".env"));
    config::load_config(project_path)
}
