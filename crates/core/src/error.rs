use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv column not found: {column} in {path}")]
    MissingColumn { column: String, path: String },

    #[error("glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("fetch of {url} returned {status}")]
    FetchStatus { url: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("no api key configured for {0}")]
    MissingApiKey(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding request returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding model {got} does not match index model {expected}")]
    ModelMismatch { expected: String, got: String },

    #[error("chunk id already present in index: {0}")]
    DuplicateId(String),

    #[error("vector count {vectors} doesn't match chunk count {chunks}")]
    CountMismatch { chunks: usize, vectors: usize },

    #[error("nothing to index: {0}")]
    Empty(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt index at {path}: {details}")]
    Corrupt { path: String, details: String },

    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("splitting failed: {0}")]
    Ingest(#[from] IngestError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
