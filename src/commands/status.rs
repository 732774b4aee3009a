use std::collections::HashSet;

use anyhow::Result;
use chrono::Local;
use colored::*;
use serde::Serialize;

use planner_recall::core::config::ProviderKind;
use planner_recall::core::document::{collect_documents, ParentRef, SourceType};
use planner_recall::search::store::{RecordStore, StoreStats};
use planner_recall::search::vectordb::VectorDB;

#[derive(Serialize)]
struct PlannerStatus {
    timestamp: String,
    meetings: usize,
    notes: usize,
    unreadable: usize,
    provider: ProviderKind,
    dimension: usize,
    index: Option<StoreStats>,
    /// Documents new or modified since they were last indexed.
    pending: usize,
    /// Indexed documents whose files are gone.
    orphaned: usize,
    warnings: Vec<String>,
}

pub fn run(json: bool) -> Result<()> {
    let (paths, config) = super::load_context()?;
    let (files, errors) = collect_documents(&paths);

    let count = |source: SourceType| {
        files
            .iter()
            .filter(|f| f.document.source_type() == source)
            .count()
    };

    let db_path = config.db_path(&paths);
    let mut warnings = Vec::new();
    let (index, pending, orphaned) = if db_path.exists() {
        let db = VectorDB::open(&db_path)?;
        let known = db.document_mtimes()?;
        let pending = files
            .iter()
            .filter(|f| known.get(&f.document.parent_ref()) != Some(&f.modified))
            .count();

        let live: HashSet<ParentRef> = files.iter().map(|f| f.document.parent_ref()).collect();
        let orphaned = db
            .indexed_parents()?
            .iter()
            .filter(|p| !live.contains(p))
            .count();
        (Some(db.stats()?), pending, orphaned)
    } else {
        warnings.push("Index not found. Run `planner index` to build it.".to_string());
        (None, files.len(), 0)
    };

    if index.is_some() && pending > 0 {
        warnings.push(format!("{} documents changed since the last index", pending));
    }
    if config.embedding.provider == ProviderKind::Disabled {
        warnings.push("Embedding provider is disabled; search returns no results".to_string());
    }
    for error in &errors {
        warnings.push(error.to_string());
    }

    let status = PlannerStatus {
        timestamp: Local::now().to_rfc3339(),
        meetings: count(SourceType::Meeting),
        notes: count(SourceType::Note),
        unreadable: errors.len(),
        provider: config.embedding.provider,
        dimension: config.embedding.dimension,
        index,
        pending,
        orphaned,
        warnings,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    Ok(())
}

fn print_status(status: &PlannerStatus) {
    println!("{}", "Planner Status".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("Checked at: {}", status.timestamp);
    println!();

    println!("{}", "Documents".cyan());
    println!("{}", "-".repeat(30));
    println!("   {:<12} {:>4}", "Meetings", status.meetings);
    println!("   {:<12} {:>4}", "Notes", status.notes);
    if status.unreadable > 0 {
        println!("   {:<12} {:>4}", "Unreadable", status.unreadable);
    }
    println!();

    println!("{}", "Index".cyan());
    println!("{}", "-".repeat(30));
    println!(
        "   {:<12} {:?} ({} dims)",
        "Provider", status.provider, status.dimension
    );
    match &status.index {
        Some(stats) => {
            println!("   {:<12} {:>4}", "Documents", stats.parent_count);
            println!("   {:<12} {:>4}", "Records", stats.record_count);
            println!("   {:<12} {:>4}", "  meeting", stats.meeting_records);
            println!("   {:<12} {:>4}", "  note", stats.note_records);
            println!("   {:<12} {:>4}", "Pending", status.pending);
            println!("   {:<12} {:>4}", "Orphaned", status.orphaned);
        }
        None => println!("   {}", "not built".dimmed()),
    }

    if !status.warnings.is_empty() {
        println!();
        println!("{}", "Attention".yellow());
        println!("{}", "-".repeat(30));
        for w in &status.warnings {
            println!("   {}", w);
        }
    }
    println!();
}
