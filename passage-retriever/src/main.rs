use clap::{Parser, Subcommand};
use passage_context::PromptTemplate;
use passage_embed::HashEmbedProvider;
use passage_retriever::{RagConfig, RagEngine};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Build and query a passage index over a folder of documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the index artifacts (overrides the configuration)
    #[arg(short, long)]
    index_dir: Option<PathBuf>,

    /// Use the model-free hashing embedder instead of the local ONNX model
    #[arg(long)]
    hash_embeddings: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index from a folder of .txt, .md, .csv and .pdf files
    Ingest {
        /// Folder to ingest (not recursive)
        folder: PathBuf,
    },
    /// Load the persisted index and report what it holds
    Load,
    /// Rank passages against a query
    Search {
        query: String,
        /// Number of results (1 to 10)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Print the context block for a query
    Context {
        query: String,
        /// Number of passages to draw from (1 to 10)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Render the full prompt around the context block
        #[arg(long)]
        prompt: bool,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show engine and index status
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct ContextOutput<'a> {
    query: &'a str,
    context: &'a str,
    prompt: Option<String>,
    items: &'a [passage_context::RetrievedItem],
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn build_engine(args: &Args) -> anyhow::Result<RagEngine> {
    let mut config = match &args.config {
        Some(path) => RagConfig::load(path)?,
        None => RagConfig::default(),
    };
    if let Some(index_dir) = &args.index_dir {
        config.index_dir = index_dir.clone();
    }

    let engine = if args.hash_embeddings {
        RagEngine::new(config, Arc::new(HashEmbedProvider::default()))?
    } else {
        RagEngine::with_fastembed(config)?
    };
    Ok(engine)
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let engine = build_engine(&args)?;
    let default_top_k = engine.config().default_top_k;

    match args.command {
        Commands::Ingest { folder } => {
            let summary = engine.ingest(&folder).await?;
            println!(
                "Indexed {} chunks from {} files into {}",
                summary.num_chunks,
                summary.num_files,
                engine.store().dir().display()
            );
            println!("Topology: {}", summary.topology);
            println!("Model: {} (dimension {})", summary.model, summary.dimension);
            Ok(())
        }
        Commands::Load => {
            let stats = engine.load().await?;
            println!(
                "Loaded {} chunks, dimension {}, {}",
                stats.num_chunks, stats.dimension, stats.topology
            );
            if !stats.vectors_cached {
                println!("Vector cache: unavailable");
            }
            Ok(())
        }
        Commands::Search {
            query,
            top_k,
            format,
        } => {
            let items = engine
                .search(&query, top_k.unwrap_or(default_top_k))
                .await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
                OutputFormat::Summary => {
                    println!("Found {} passages:", items.len());
                    for item in &items {
                        println!(
                            "  Score: {:.3} | Source: {} | Chunk: {}",
                            item.score, item.source, item.chunk_index
                        );
                        println!(
                            "    {}",
                            item.snippet.chars().take(100).collect::<String>()
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Context {
            query,
            top_k,
            prompt,
            format,
        } => {
            let assembled = engine
                .build_context(&query, top_k.unwrap_or(default_top_k))
                .await?;
            let rendered =
                prompt.then(|| PromptTemplate::default().render(&query, &assembled.context));
            match format {
                OutputFormat::Json => {
                    let output = ContextOutput {
                        query: &query,
                        context: &assembled.context,
                        prompt: rendered,
                        items: &assembled.items,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("{}", rendered.unwrap_or(assembled.context));
                    if !assembled.items.is_empty() {
                        println!("---");
                        for item in &assembled.items {
                            println!("[{:.3}] {}#{}", item.score, item.source, item.chunk_index);
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Status { format } => {
            if engine.store().exists() {
                if let Err(e) = engine.load().await {
                    tracing::warn!("Index on disk could not be loaded: {}", e);
                }
            }
            let status = engine.status().await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Summary => print!("{status}"),
            }
            Ok(())
        }
    }
}
