mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use planner_recall::core::document::SourceType;

#[derive(Parser)]
#[command(name = "planner")]
#[command(about = "On-device search over planner meetings and notes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check (or create) the planner folder layout
    Init {
        #[arg(long, help = "Create missing folders and a default config")]
        create: bool,
    },
    /// Build the search index from Meetings/ and Notes/
    Index {
        #[arg(long, help = "Show index status only")]
        status: bool,
        #[arg(long, help = "Force rebuild index")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Hybrid semantic + keyword search
    #[command(alias = "ss")]
    Search {
        query: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, conflicts_with = "meetings", help = "Search notes only")]
        notes: bool,
        #[arg(long, help = "Search meetings only")]
        meetings: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Documents on disk versus the index
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server for assistant integration
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show MCP client configuration instructions")]
        install: bool,
    },
}

fn init_tracing() {
    // Logs go to stderr; stdout carries command output and the MCP transport
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Init { create } => commands::init::run(create),
        Commands::Index {
            status,
            rebuild,
            json,
        } => commands::index::run(status, rebuild, json),
        Commands::Search {
            query,
            limit,
            notes,
            meetings,
            json,
        } => {
            let source = match (notes, meetings) {
                (true, _) => Some(SourceType::Note),
                (_, true) => Some(SourceType::Meeting),
                _ => None,
            };
            commands::search::run(&query, limit, source, json)
        }
        Commands::Status { json } => commands::status::run(json),

        // MCP Server
        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions();
                Ok(())
            } else {
                run_mcp_server()
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server() -> anyhow::Result<()> {
    let root = std::env::current_dir()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(root))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions() {
    use colored::Colorize;

    let planner_path = std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "/path/to/your/planner".to_string());

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "planner".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "planner-recall": {{
      "command": "{}",
      "args": ["mcp"],
      "cwd": "{}"
    }}
  }}
}}"#, binary_path, planner_path);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Search meetings and notes", "planner_search".green());
    println!("  • {} - Search notes only", "planner_search_notes".green());
    println!("  • {} - Search meetings only", "planner_query_meetings".green());
    println!("  • {} - Index statistics", "planner_index_status".green());
}
