//! Search command - hybrid search over indexed meetings and notes

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use planner_recall::core::document::SourceType;
use planner_recall::search::embedding::provider_from_config;
use planner_recall::search::engine::{SearchEngine, SearchResult};
use planner_recall::search::vectordb::VectorDB;

#[derive(Serialize)]
struct SearchHit<'a> {
    rank: usize,
    score: f64,
    source_type: SourceType,
    document: String,
    chunk_index: usize,
    text: &'a str,
}

impl<'a> SearchHit<'a> {
    fn new(rank: usize, result: &'a SearchResult) -> Self {
        Self {
            rank,
            score: result.score,
            source_type: result.source_type,
            document: result.parent.id.clone(),
            chunk_index: result.chunk_index,
            text: &result.chunk_text,
        }
    }
}

/// Run search command
pub fn run(query: &str, limit: Option<usize>, source: Option<SourceType>, json: bool) -> Result<()> {
    let (paths, config) = super::load_context()?;
    let db_path = config.db_path(&paths);
    let limit = limit.unwrap_or(config.default_top_k);

    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": "Index not found",
                    "hint": "Run `planner index` first"
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

    let db = VectorDB::open(&db_path)?;
    let provider = provider_from_config(&config.embedding);
    let engine = SearchEngine::new(provider.as_ref());
    let results = engine.search_filtered(&db, query, limit, source)?;

    if json {
        let hits: Vec<SearchHit> = results
            .iter()
            .enumerate()
            .map(|(i, r)| SearchHit::new(i + 1, r))
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        query.cyan()
    );
    println!();

    for (i, result) in results.iter().enumerate() {
        let score_str = format!("{:.2}", result.score);
        let score_colored = if result.score > 0.8 {
            score_str.green()
        } else if result.score > 0.5 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            score_colored,
            result.source_type.as_str().dimmed(),
            result.parent.id.cyan()
        );

        // Truncate chunk for display (char-aware for Unicode)
        let text = if result.chunk_text.chars().count() > 160 {
            format!("{}...", result.chunk_text.chars().take(160).collect::<String>())
        } else {
            result.chunk_text.clone()
        };
        println!("   {}", text.dimmed());
        println!();
    }

    Ok(())
}
