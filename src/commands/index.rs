//! Index command - Build the retrieval index from Meetings/ and Notes/

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use planner_recall::core::document::{collect_documents, ParentRef};
use planner_recall::search::embedding::provider_from_config;
use planner_recall::search::indexer::{prune_missing, Indexer};
use planner_recall::search::store::RecordStore;
use planner_recall::search::vectordb::VectorDB;

const PROVIDER_META_KEY: &str = "embedding_provider";

/// Run index command
pub fn run(status_only: bool, rebuild: bool, json: bool) -> Result<()> {
    let (paths, config) = super::load_context()?;
    let db_path = config.db_path(&paths);

    if status_only {
        return show_status(&db_path, json);
    }

    // Create data directory if needed
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Delete existing database if rebuild requested
    if rebuild && db_path.exists() {
        std::fs::remove_file(&db_path)?;
        if !json {
            println!("{} Removed existing index", "→".dimmed());
        }
    }

    let db = VectorDB::open(&db_path)
        .with_context(|| format!("Failed to open index at {}", db_path.display()))?;
    let provider = provider_from_config(&config.embedding);

    if !provider.is_available() && !json {
        println!(
            "{} Embedding provider is disabled; documents will be indexed without records",
            "!".yellow().bold()
        );
    }

    let (files, errors) = collect_documents(&paths);
    for error in &errors {
        warn!(error = %error, "Skipping document");
    }

    // Drop records for documents whose files are gone
    let live: HashSet<ParentRef> = files.iter().map(|f| f.document.parent_ref()).collect();
    let pruned = prune_missing(&db, &live)?;

    // Vectors from a different provider or dimension are not comparable
    let signature = format!(
        "{:?}/{}",
        config.embedding.provider, config.embedding.dimension
    );
    let provider_changed = db.get_meta(PROVIDER_META_KEY)?.as_deref() != Some(signature.as_str());
    if provider_changed {
        info!(provider = %signature, "Embedding provider changed, re-indexing everything");
    }

    let known = db.document_mtimes()?;
    let pending: Vec<_> = files
        .iter()
        .filter(|f| provider_changed || known.get(&f.document.parent_ref()) != Some(&f.modified))
        .collect();
    let unchanged = files.len() - pending.len();
    let mtimes: HashMap<ParentRef, i64> = pending
        .iter()
        .map(|f| (f.document.parent_ref(), f.modified))
        .collect();

    if !json {
        println!(
            "{} Indexing {} documents ({} unchanged)...",
            "→".dimmed(),
            pending.len(),
            unchanged
        );
    }

    // Ctrl-C stops the pass between documents
    let runtime = tokio::runtime::Runtime::new()?;
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current document");
            on_signal.cancel();
        }
    });

    let indexer = Indexer::new(provider.as_ref());
    let stats = indexer.index_all_with(
        &db,
        pending.iter().map(|f| &f.document),
        &cancel,
        |document, _| {
            let parent = document.parent_ref();
            if let Some(&mtime) = mtimes.get(&parent) {
                if let Err(e) = db.set_document_mtime(&parent, mtime) {
                    warn!(parent = %parent, error = %e, "Failed to record document mtime");
                }
            }
        },
    );
    runtime.shutdown_background();

    db.set_meta("last_full_index", &chrono::Utc::now().timestamp().to_string())?;
    if !stats.cancelled && stats.failed == 0 {
        db.set_meta(PROVIDER_META_KEY, &signature)?;
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "indexed": stats.indexed,
                "empty": stats.empty,
                "unchanged": unchanged,
                "failed": stats.failed,
                "unreadable": errors.len(),
                "pruned": pruned,
                "records": stats.records,
                "skipped_chunks": stats.skipped_chunks,
                "cancelled": stats.cancelled,
                "duration_ms": stats.duration_ms,
            })
        );
    } else {
        println!();
        println!(
            "{} Indexed {} documents ({} records) in {:.2}s",
            "✓".green().bold(),
            stats.indexed.to_string().cyan(),
            stats.records,
            stats.duration_ms as f64 / 1000.0
        );
        if stats.empty > 0 {
            println!("  {} {} documents had no content", "→".dimmed(), stats.empty);
        }
        if stats.skipped_chunks > 0 {
            println!(
                "  {} {} chunks skipped (no embedding)",
                "→".dimmed(),
                stats.skipped_chunks
            );
        }
        if pruned > 0 {
            println!("  {} {} removed documents pruned", "→".dimmed(), pruned);
        }
        if stats.failed > 0 {
            println!("  {} {} documents failed", "✗".red(), stats.failed);
        }
        if !errors.is_empty() {
            println!("  {} {} files could not be read", "✗".red(), errors.len());
        }
        if stats.cancelled {
            println!("  {} Interrupted; run again to finish", "!".yellow());
        }
        println!("  {} Index saved to: {}", "→".dimmed(), db_path.display());
    }

    Ok(())
}

/// Show index status
fn show_status(db_path: &Path, json: bool) -> Result<()> {
    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "error": "Index not found"
                })
            );
        } else {
            println!(
                "{} Index not found. Run {} first.",
                "!".yellow().bold(),
                "planner index".cyan()
            );
        }
        return Ok(());
    }

    let db = VectorDB::open(db_path)?;
    let stats = db.stats()?;

    let file_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "document_count": stats.parent_count,
                "record_count": stats.record_count,
                "meeting_records": stats.meeting_records,
                "note_records": stats.note_records,
                "last_indexed": stats.last_indexed.map(|t| t.to_rfc3339()),
                "file_size_bytes": file_size,
            })
        );
    } else {
        println!("{}", "Index Status".bold());
        println!();
        println!(
            "  {} {} documents indexed",
            "→".dimmed(),
            stats.parent_count.to_string().cyan()
        );
        println!(
            "  {} {} records ({} meeting, {} note)",
            "→".dimmed(),
            stats.record_count.to_string().cyan(),
            stats.meeting_records,
            stats.note_records
        );
        println!(
            "  {} Size: {:.2} KB",
            "→".dimmed(),
            file_size as f64 / 1024.0
        );
        if let Some(ts) = stats.last_indexed {
            let local = ts.with_timezone(&chrono::Local);
            println!(
                "  {} Last indexed: {}",
                "→".dimmed(),
                local.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
