//! # Course RAG CLI (`course-rag`)
//!
//! ## Usage
//!
//! ```bash
//! course-rag --config ./config/course-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `course-rag init` | Create the SQLite index and run schema migrations |
//! | `course-rag load [--dir DIR] [--clear]` | Index course documents from a folder |
//! | `course-rag ask "<question>"` | Answer one question |
//! | `course-rag courses` | List indexed courses |
//! | `course-rag serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use course_rag::config::{self, Config};
use course_rag::document::DocumentProcessor;
use course_rag::embedding::{create_provider, EmbeddingProvider};
use course_rag::rag::RagSystem;
use course_rag::vector_store::VectorIndex;
use course_rag::{db, ingest, migrate, server};

/// Course RAG: ask questions about a folder of course documents.
#[derive(Parser)]
#[command(name = "course-rag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/course-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index schema.
    ///
    /// Idempotent. Does nothing for the memory backend.
    Init,

    /// Index course documents (.txt, .pdf, .docx) from a folder.
    ///
    /// Courses whose title is already indexed are skipped.
    Load {
        /// Folder to load. Defaults to `[loader].docs_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Drop the whole index before loading.
        #[arg(long)]
        clear: bool,
    },

    /// Ask one question and print the answer with its sources.
    ///
    /// Each invocation is a fresh conversation; history lives only inside
    /// a running `serve` process.
    Ask { question: String },

    /// List indexed courses.
    Courses,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Load { dir, clear } => run_load(&cfg, dir, clear).await?,
        Commands::Ask { question } => run_ask(&cfg, &question).await?,
        Commands::Courses => run_courses(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

async fn open_index(cfg: &Config) -> anyhow::Result<VectorIndex> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&cfg.embedding)?);
    Ok(VectorIndex::open(cfg, embedder).await?)
}

async fn run_init(cfg: &Config) -> anyhow::Result<()> {
    if cfg.index.backend != "sqlite" {
        println!("Index backend '{}' needs no initialization.", cfg.index.backend);
        return Ok(());
    }
    let pool = db::connect(&cfg.index.path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Index initialized at {}", cfg.index.path.display());
    Ok(())
}

async fn run_load(cfg: &Config, dir: Option<PathBuf>, clear: bool) -> anyhow::Result<()> {
    let index = open_index(cfg).await?;
    let processor = DocumentProcessor::new(cfg.chunking.settings());
    let dir = dir.unwrap_or_else(|| cfg.loader.docs_dir.clone());

    let summary =
        ingest::load_folder(&index, &processor, &dir, &cfg.loader.include_globs, clear).await?;

    println!("load {}", dir.display());
    println!("  courses added: {}", summary.courses_added);
    println!("  chunks added: {}", summary.chunks_added);
    println!("  skipped (already indexed): {}", summary.skipped.len());
    for failed in &summary.failed {
        println!("  failed: {} ({})", failed.path, failed.error);
    }
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str) -> anyhow::Result<()> {
    let system = RagSystem::from_config(cfg).await?;
    if cfg.index.backend == "memory" {
        system
            .add_course_folder(&cfg.loader.docs_dir, &cfg.loader.include_globs, false)
            .await
            .context("loading courses into the memory index")?;
    }

    let response = system.query(question, None).await?;
    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &response.sources {
            match &source.link {
                Some(link) => println!("  {} <{}>", source.label, link),
                None => println!("  {}", source.label),
            }
        }
    }
    Ok(())
}

async fn run_courses(cfg: &Config) -> anyhow::Result<()> {
    let index = open_index(cfg).await?;
    let titles = index.course_titles().await?;
    println!("{} course(s)", titles.len());
    for title in titles {
        println!("  {}", title);
    }
    Ok(())
}
