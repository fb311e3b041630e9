//! # askpdf CLI
//!
//! ```bash
//! askpdf serve                              # index the document, serve the form
//! askpdf ask "What does section 12 say?"    # one-shot answer on stdout
//! askpdf fragments                          # show how the document is split
//! ```
//!
//! Every command accepts `--config <path>`. Without it `./config/askpdf.toml`
//! is used when present, otherwise the built-in defaults.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use askpdf::config::{self, Config};
use askpdf::knowledge::KnowledgeBase;
use askpdf::loader::load_document;
use askpdf::server;
use askpdf::wrap::wrap_text;

const DEFAULT_CONFIG: &str = "./config/askpdf.toml";

/// Ask questions about a single document, answered by a hosted LLM.
#[derive(Parser)]
#[command(name = "askpdf", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the document and serve the question form over HTTP.
    Serve,

    /// Answer one question and print it.
    Ask {
        /// The question.
        question: String,
    },

    /// Load and split the document without embedding it.
    ///
    /// Needs no credential; useful to check extraction and chunking.
    Fragments,
}

fn load(cli_config: Option<&PathBuf>) -> anyhow::Result<Config> {
    match cli_config {
        Some(path) => config::load_config(path),
        None => config::load_config_or_default(&PathBuf::from(DEFAULT_CONFIG)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve => {
            let kb = KnowledgeBase::from_config(&cfg)
                .await
                .context("failed to build knowledge base")?;
            server::run_server(&cfg, Arc::new(kb)).await?;
        }
        Commands::Ask { question } => {
            if question.trim().is_empty() {
                return Ok(());
            }
            let kb = KnowledgeBase::from_config(&cfg)
                .await
                .context("failed to build knowledge base")?;
            let answer = kb.ask(&question).await?;
            println!("{}", wrap_text(&answer.answer, cfg.ui.wrap_width));
            println!();
            for source in &answer.sources {
                println!(
                    "  [p. {} #{}] score {:.3}",
                    source.fragment.page + 1,
                    source.fragment.chunk_index,
                    source.score
                );
            }
        }
        Commands::Fragments => {
            let doc = load_document(&cfg.document.path, cfg.chunking.max_tokens)?;
            println!("document:    {}", cfg.document.path.display());
            println!("fingerprint: {}", doc.fingerprint);
            println!("pages:       {}", doc.pages);
            println!("fragments:   {}", doc.fragments.len());
            println!();
            for f in &doc.fragments {
                let preview: String = f
                    .text
                    .chars()
                    .take(60)
                    .map(|c| if c.is_whitespace() { ' ' } else { c })
                    .collect();
                println!(
                    "p{:<4} c{:<3} {:>6} chars  {}",
                    f.page + 1,
                    f.chunk_index,
                    f.text.chars().count(),
                    preview
                );
            }
        }
    }

    Ok(())
}
