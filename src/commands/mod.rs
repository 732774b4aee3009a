pub mod index;
pub mod init;
pub mod search;
pub mod status;

use anyhow::{Context, Result};

use planner_recall::core::config::PlannerConfig;
use planner_recall::core::paths::PlannerPaths;

/// Planner layout and configuration for the current directory.
pub fn load_context() -> Result<(PlannerPaths, PlannerConfig)> {
    let paths = PlannerPaths::current().context("Failed to read current directory")?;
    let config = PlannerConfig::load(&paths)
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;
    Ok((paths, config))
}
