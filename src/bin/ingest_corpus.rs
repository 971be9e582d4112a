//! Build the question corpus from a directory of extracted textbook text.
//!
//! Every `.txt` / `.md` file is one book titled by its file stem. A sibling
//! `<stem>_Solutions.<ext>` file is indexed as that book's solutions. Books that fail are logged
//! and the run continues; the exit status reports whether any failed.
use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use examforge::{
    config,
    corpus::{BookFile, CorpusIngestor, IngestOutcome, IngestSettings, discover_books},
    embedding::build_embedding_client,
    logging,
    qdrant::QdrantService,
};

#[derive(Parser)]
#[command(
    name = "ingest-corpus",
    about = "Chunk, embed and index textbook text files into the question corpus"
)]
struct Cli {
    /// Directory scanned recursively for book files.
    #[arg(long, default_value = "data/books")]
    dir: PathBuf,
    /// Override the derived chunk size (tokens).
    #[arg(long)]
    chunk_size: Option<usize>,
    /// List the books that would be ingested and exit.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let books = discover_books(&cli.dir)
        .with_context(|| format!("failed to scan {}", cli.dir.display()))?;
    if books.is_empty() {
        tracing::warn!(dir = %cli.dir.display(), "No book files found");
        return Ok(());
    }

    if cli.dry_run {
        for book in &books {
            match &book.solutions {
                Some(solutions) => println!(
                    "{} ({}; solutions: {})",
                    book.title,
                    book.path.display(),
                    solutions.display()
                ),
                None => println!("{} ({})", book.title, book.path.display()),
            }
        }
        return Ok(());
    }

    let config = config::get_config();
    let embedder = build_embedding_client(config).context("failed to build embedding client")?;
    let qdrant = QdrantService::from_config(config).context("failed to build Qdrant client")?;
    let mut settings = IngestSettings::from_config(config);
    if cli.chunk_size.is_some() {
        settings.chunk_size = cli.chunk_size;
    }
    let ingestor = CorpusIngestor::new(Arc::from(embedder), Arc::new(qdrant), settings);
    ingestor
        .ensure_collection()
        .await
        .context("failed to prepare corpus collection")?;

    let mut failed = 0usize;
    let mut total_chunks = 0usize;
    for book in &books {
        match ingest_one(&ingestor, book).await {
            Ok(outcome) => {
                total_chunks += outcome.total_chunks();
                tracing::info!(
                    book = %book.title,
                    content_chunks = outcome.content_chunks,
                    solution_chunks = outcome.solution_chunks,
                    skipped_duplicates = outcome.skipped_duplicates,
                    "Book ingested"
                );
            }
            Err(error) => {
                failed += 1;
                tracing::error!(book = %book.title, error = format!("{error:#}"), "Book failed");
            }
        }
    }

    tracing::info!(
        books = books.len(),
        failed,
        chunks = total_chunks,
        collection = %ingestor.collection(),
        "Corpus ingestion finished"
    );
    if failed > 0 {
        bail!("{failed} of {} books failed to ingest", books.len());
    }
    Ok(())
}

async fn ingest_one(ingestor: &CorpusIngestor, book: &BookFile) -> Result<IngestOutcome> {
    let text = fs::read_to_string(&book.path)
        .with_context(|| format!("failed to read {}", book.path.display()))?;
    let solutions = book
        .solutions
        .as_ref()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .transpose()?;
    let outcome = ingestor
        .ingest_book(&book.title, &text, solutions.as_deref())
        .await?;
    Ok(outcome)
}
