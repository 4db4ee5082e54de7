mod prompt;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use corpus_index_core::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use corpus_index_core::{
    load_source, merge_indexes, output_path, resolve_input_path, CharacterNgramEmbedder, Embedder,
    FlatIndex, IndexCoordinator, IngestionOptions, OpenAiConfig, OpenAiEmbedder,
    RecursiveTextSplitter, SourceRequest, SplitterConfig, VectorIndex,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "corpus-index", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Root that relative input and merge paths resolve against
    #[arg(long, env = "CORPUS_INPUT_DIR", default_value = "./input_data", global = true)]
    input_dir: PathBuf,

    /// Directory that receives saved indexes
    #[arg(long, env = "CORPUS_OUTPUT_DIR", default_value = "./output_data", global = true)]
    output_dir: PathBuf,

    /// Prefix prepended to every saved index name
    #[arg(long, default_value = "index_", global = true)]
    index_prefix: String,

    /// Maximum characters per chunk
    #[arg(long, default_value = "1500", global = true)]
    chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[arg(long, default_value = "200", global = true)]
    chunk_overlap: usize,

    /// Embedding backend
    #[arg(long, value_enum, default_value = "openai", global = true)]
    embedder: EmbedderKind,

    /// API key for the OpenAI-compatible embedding service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible embedding service
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    openai_base_url: String,

    /// Embedding model name
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Embedding vector length
    #[arg(long, global = true)]
    embedding_dimensions: Option<usize>,

    /// Retries for failed embedding requests
    #[arg(long, default_value = "2", global = true)]
    max_retries: u32,

    /// Chunks sent per embedding request
    #[arg(long, default_value = "512", global = true)]
    batch_size: usize,

    /// Link depth followed by urls-recursively
    #[arg(long, default_value = "7", global = true)]
    crawl_depth: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// OpenAI-compatible HTTP embeddings
    Openai,
    /// Offline hashed character trigrams
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Index every matching file under a folder.
    Folder {
        /// Folder path, relative to the input dir.
        #[arg(long)]
        path: String,
        /// Glob filter; blank feeds everything.
        #[arg(long, default_value = "")]
        glob: String,
        /// Name of the index to create.
        #[arg(long)]
        name: String,
    },
    /// Index a plain text file.
    Txt {
        #[arg(long)]
        path: String,
        #[arg(long)]
        name: String,
    },
    /// Index a CSV file, one document per row.
    Csv {
        #[arg(long)]
        path: String,
        #[arg(long)]
        name: String,
    },
    /// Index a PDF file.
    Pdf {
        #[arg(long)]
        path: String,
        #[arg(long)]
        name: String,
    },
    /// Index comma separated URLs.
    Urls {
        #[arg(long)]
        urls: String,
        #[arg(long)]
        name: String,
    },
    /// Crawl a site below a root URL and index every page.
    UrlsRecursively {
        #[arg(long)]
        url: String,
        #[arg(long)]
        name: String,
    },
    /// Index the URLs listed in one column of a CSV file.
    UrlsFromCsv {
        #[arg(long)]
        path: String,
        #[arg(long)]
        column: String,
        #[arg(long)]
        name: String,
    },
    /// Merge saved indexes into a new one.
    #[command(alias = "merge-faiss")]
    Merge {
        /// Comma separated index paths, relative to the input dir.
        #[arg(long)]
        indexes: String,
        #[arg(long)]
        name: String,
    },
    /// Query a saved index.
    Search {
        /// Index path, relative to the output dir.
        #[arg(long)]
        index: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
}

pub(crate) enum Action {
    Build {
        request: SourceRequest,
        name: String,
    },
    Merge {
        paths: Vec<PathBuf>,
        name: String,
    },
    Search {
        index: PathBuf,
        query: String,
        top_k: usize,
    },
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn merge_paths(input_dir: &Path, raw: &str) -> Vec<PathBuf> {
    split_list(raw)
        .iter()
        .map(|item| resolve_input_path(input_dir, item))
        .collect()
}

impl Cli {
    fn action_from(&self, command: Command) -> Action {
        let input = |path: &str| resolve_input_path(&self.input_dir, path);

        match command {
            Command::Folder { path, glob, name } => Action::Build {
                request: SourceRequest::Folder {
                    path: input(&path),
                    glob,
                },
                name,
            },
            Command::Txt { path, name } => Action::Build {
                request: SourceRequest::Txt { path: input(&path) },
                name,
            },
            Command::Csv { path, name } => Action::Build {
                request: SourceRequest::Csv { path: input(&path) },
                name,
            },
            Command::Pdf { path, name } => Action::Build {
                request: SourceRequest::Pdf { path: input(&path) },
                name,
            },
            Command::Urls { urls, name } => Action::Build {
                request: SourceRequest::Urls { urls },
                name,
            },
            Command::UrlsRecursively { url, name } => Action::Build {
                request: SourceRequest::UrlsRecursively { url },
                name,
            },
            Command::UrlsFromCsv { path, column, name } => Action::Build {
                request: SourceRequest::UrlsFromCsv {
                    path: input(&path),
                    column,
                },
                name,
            },
            Command::Merge { indexes, name } => Action::Merge {
                paths: merge_paths(&self.input_dir, &indexes),
                name,
            },
            Command::Search {
                index,
                query,
                top_k,
            } => Action::Search {
                index: resolve_input_path(&self.output_dir, &index),
                query,
                top_k,
            },
        }
    }

    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            crawl_max_depth: self.crawl_depth,
            ..IngestionOptions::default()
        }
    }

    fn openai_config(&self) -> OpenAiConfig {
        let defaults = OpenAiConfig::default();
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self
                .embedding_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            dimensions: self.embedding_dimensions.unwrap_or(defaults.dimensions),
            max_retries: self.max_retries,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let mut cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "corpus-index boot"
    );

    let action = match cli.command.take() {
        Some(command) => Some(cli.action_from(command)),
        None => prompt::prompt_action(&cli.input_dir, &cli.output_dir)?,
    };

    let Some(action) = action else {
        warn!("unrecognized choice, nothing to do");
        return Ok(());
    };

    match action {
        Action::Merge { paths, name } => run_merge(&cli, &paths, &name),
        action => match cli.embedder {
            EmbedderKind::Openai => {
                let embedder = OpenAiEmbedder::new(cli.openai_config())
                    .context("OPENAI_API_KEY must be set to use the openai embedder")?;
                run_with_embedder(&cli, action, embedder).await
            }
            EmbedderKind::Ngram => {
                let dimensions = cli
                    .embedding_dimensions
                    .unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS);
                run_with_embedder(&cli, action, CharacterNgramEmbedder::new(dimensions)).await
            }
        },
    }
}

async fn run_with_embedder<E: Embedder>(cli: &Cli, action: Action, embedder: E) -> anyhow::Result<()> {
    let options = cli.ingestion_options();
    let splitter = RecursiveTextSplitter::new(SplitterConfig::from(&options))?;
    let coordinator = IndexCoordinator::new(splitter, embedder).with_batch_size(cli.batch_size);

    match action {
        Action::Build { request, name } => {
            let destination = output_path(&cli.output_dir, &cli.index_prefix, &name)?;
            let report = load_source(&request, &options).await?;

            for skipped in &report.skipped {
                warn!(source = %skipped.source, reason = %skipped.reason, "skipped source");
            }
            println!("Loaded {} {} documents.", report.documents.len(), request.format());
            if report.documents.is_empty() {
                bail!("no documents could be loaded for {}", request.format());
            }

            let built = coordinator.build(&report.documents).await?;
            for dropped in &built.dropped_documents {
                warn!(source = %dropped, "document has no text");
            }
            println!(
                "Index created: {} chunks from {} documents.",
                built.chunk_count, built.document_count
            );

            let manifest = built.index.save_local(&destination)?;
            info!(path = %destination.display(), index_id = %manifest.index_id, "index saved");
            println!("Index saved locally: {}", destination.display());
        }
        Action::Search {
            index,
            query,
            top_k,
        } => {
            let loaded = FlatIndex::load_local(&index)
                .with_context(|| format!("loading index {}", index.display()))?;
            let hits = coordinator.search(&loaded, &query, top_k).await?;

            println!("query: {query}");
            for hit in hits {
                println!(
                    "[{}] distance={:.4} chunk={} source={}",
                    hit.rank + 1,
                    hit.distance,
                    hit.chunk.chunk_id,
                    hit.chunk.source
                );
                println!("  chunk_text:\n{}", hit.chunk.text);
            }
        }
        Action::Merge { paths, name } => run_merge(cli, &paths, &name)?,
    }

    Ok(())
}

fn run_merge(cli: &Cli, paths: &[PathBuf], name: &str) -> anyhow::Result<()> {
    let destination = output_path(&cli.output_dir, &cli.index_prefix, name)?;
    for path in paths {
        info!(path = %path.display(), "index to merge");
    }

    let merged = merge_indexes(paths)?;
    println!("Indexes merged: {} entries.", merged.len());

    merged.save_local(&destination)?;
    println!("Index saved locally: {}", destination.display());
    Ok(())
}
