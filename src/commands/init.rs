use anyhow::Result;
use colored::*;
use std::fs;

use planner_recall::core::config::PlannerConfig;
use planner_recall::core::paths::PlannerPaths;

pub fn run(create: bool) -> Result<()> {
    let paths = PlannerPaths::current()?;

    println!("{}", "Planner Structure Check".bold());
    println!("{}", "=".repeat(50));
    println!();

    let mut missing = 0;
    let mut created = 0;

    println!("{}", "Checking required folders...".cyan());
    println!();

    for (path, purpose) in paths.required_folders() {
        if path.exists() {
            println!("{} {} exists ({})", "✓".green(), path.display(), purpose);
        } else if create {
            fs::create_dir_all(path)?;
            created += 1;
            println!("{} Created {} ({})", "✓".green(), path.display(), purpose);
        } else {
            missing += 1;
            println!("{} {} missing ({})", "✗".red(), path.display(), purpose);
        }
    }

    println!();
    if paths.config_file.exists() {
        // Surface a broken config now rather than on the next index
        PlannerConfig::load(&paths)?;
        println!("{} {} is valid", "✓".green(), paths.config_file.display());
    } else if create {
        fs::write(&paths.config_file, PlannerConfig::default().to_toml()?)?;
        created += 1;
        println!(
            "{} Wrote default {}",
            "✓".green(),
            paths.config_file.display()
        );
    } else {
        println!(
            "{} {} not found (defaults apply)",
            "→".dimmed(),
            paths.config_file.display()
        );
    }

    println!();
    println!("{}", "Summary".bold());
    println!("{}", "=".repeat(50));

    if create {
        println!("Created: {}", created.to_string().green());
    } else {
        println!(
            "Missing: {} folders",
            if missing > 0 {
                missing.to_string().red()
            } else {
                missing.to_string().green()
            }
        );
    }
    println!();

    if missing == 0 {
        println!("{}", "✓ Planner structure is ready!".green());
        Ok(())
    } else {
        println!(
            "{}",
            "Run with --create to create missing folders.".yellow()
        );
        std::process::exit(1);
    }
}
