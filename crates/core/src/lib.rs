pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod sources;
pub mod stores;
pub mod traits;
pub mod web;

pub use chunking::{RecursiveTextSplitter, SplitterConfig, DEFAULT_SEPARATORS};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EmbedError, IndexError, IngestError};
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use ingest::{
    discover_files, load_csv, load_file, load_folder, load_pdf, load_text, read_csv_column,
    resolve_input_path, LoadReport, SkippedSource, DEFAULT_FOLDER_GLOB,
};
pub use models::{Chunk, Document, IngestionOptions, Metadata, SearchHit, SourceFormat};
pub use openai::{OpenAiConfig, OpenAiEmbedder};
pub use orchestrator::{merge_indexes, output_path, BuildReport, IndexCoordinator};
pub use sources::{load_source, SourceRequest};
pub use stores::{FlatIndex, IndexManifest};
pub use traits::VectorIndex;
pub use web::{html_to_text, normalize_urls, parse_url_list, UrlList, WebLoader};
