use clap::{Parser, Subcommand, ValueEnum};
use scribe_ai_context::DocumentSnapshot;
use scribe_ai_retriever::config::RetrieverConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Index screenplays and search their scenes by meaning.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite file for persistent vectors (overrides the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Read input as tagged lines (`<tag>|<text>`, or `<tag>+|<text>` for a line
    /// that continues onto the next row) instead of plain screenplay text
    #[arg(long, global = true)]
    tagged: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the scene chunks of a screenplay
    Chunks { file: PathBuf },
    /// Build the index for a screenplay
    Index { file: PathBuf },
    /// Find the scenes most similar to a query
    Search {
        file: PathBuf,
        query: String,
        /// Number of results (defaults to the configured default_k)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Render the context block a prompt would receive for a query
    Context {
        file: PathBuf,
        query: String,
        #[arg(short)]
        k: Option<usize>,
        /// Character budget (defaults to the configured context_char_budget)
        #[arg(long)]
        budget: Option<usize>,
    },
    /// Index a screenplay and report index state
    Status { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

#[derive(Serialize)]
struct IndexOutput<'a> {
    document_id: &'a str,
    status: scribe_ai_retriever::IndexStatus,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => RetrieverConfig::load(path)?,
        None => RetrieverConfig::default(),
    };
    if let Some(db) = &args.db {
        config.database_path = Some(db.clone());
    }

    match &args.command {
        Commands::Chunks { file } => {
            let snapshot = read_snapshot(file, args.tagged)?;
            let chunks = config.manager_config().chunker.chunk(&snapshot);
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&chunks)?),
                OutputFormat::Summary => {
                    println!("Found {} chunks:", chunks.len());
                    for chunk in &chunks {
                        let meta = &chunk.metadata;
                        println!(
                            "  Scene {}: {} | Lines: {}-{} | Words: {} | Characters: {}",
                            meta.sequence_number,
                            meta.heading.as_deref().unwrap_or("(untitled)"),
                            meta.line_range.0,
                            meta.line_range.1,
                            meta.word_count,
                            meta.characters.join(", ")
                        );
                    }
                }
            }
        }
        Commands::Index { file } => {
            let snapshot = read_snapshot(file, args.tagged)?;
            let registry = config.build_registry().await?;
            let document_id = document_id(file);
            let context = registry.context(&document_id)?;
            let status = context.ensure_up_to_date(&snapshot).await?;
            match args.format {
                OutputFormat::Json => {
                    let output = IndexOutput {
                        document_id: &document_id,
                        status,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => println!(
                    "{}: {:?}, {} chunks, ready: {}",
                    document_id, status.outcome, status.chunk_count, status.ready
                ),
            }
        }
        Commands::Search { file, query, k } => {
            let snapshot = read_snapshot(file, args.tagged)?;
            let registry = config.build_registry().await?;
            let context = registry.context(&document_id(file))?;
            context.ensure_up_to_date(&snapshot).await?;

            let k = k.unwrap_or(config.default_k);
            if k == 0 {
                anyhow::bail!("-k must be at least 1");
            }
            let results = context.retrieve(query, k).await?;
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Summary => {
                    if results.is_empty() {
                        println!("{}", scribe_ai_retriever::SearchStatus::NoMatches);
                    }
                    for result in &results {
                        println!(
                            "  {:.3} | Scene {}: {} | Lines: {}-{}",
                            result.similarity,
                            result.metadata.sequence_number,
                            result.metadata.heading.as_deref().unwrap_or("(untitled)"),
                            result.metadata.line_range.0,
                            result.metadata.line_range.1
                        );
                    }
                }
            }
        }
        Commands::Context {
            file,
            query,
            k,
            budget,
        } => {
            let snapshot = read_snapshot(file, args.tagged)?;
            let registry = config.build_registry().await?;
            let context = registry.context(&document_id(file))?;

            let k = k.unwrap_or(config.default_k);
            if k == 0 {
                anyhow::bail!("-k must be at least 1");
            }
            let budget = budget.unwrap_or(config.context_char_budget);
            let bundle = context.retrieve_context(&snapshot, query, k, budget).await;
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&bundle)?),
                OutputFormat::Summary => {
                    println!("[{}]", bundle.status);
                    if !bundle.is_empty() {
                        println!("{}", bundle.text);
                    }
                }
            }
        }
        Commands::Status { file } => {
            let snapshot = read_snapshot(file, args.tagged)?;
            let registry = config.build_registry().await?;
            let context = registry.context(&document_id(file))?;
            if let Err(e) = context.ensure_up_to_date(&snapshot).await {
                tracing::warn!("Refresh failed: {}", e);
            }
            let report = context.report().await;
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary => println!("{report}"),
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_snapshot(path: &Path, tagged: bool) -> anyhow::Result<DocumentSnapshot> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    if tagged {
        DocumentSnapshot::from_tagged_lines(&content)
            .map_err(|e| anyhow::anyhow!("Invalid tagged input in {}: {}", path.display(), e))
    } else {
        Ok(DocumentSnapshot::from_screenplay_text(&content))
    }
}

fn document_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
