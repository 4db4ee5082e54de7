use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

pub type Metadata = BTreeMap<String, String>;

/// Input formats the loaders understand, keyed by the tags users type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Folder,
    Txt,
    Csv,
    Urls,
    UrlsRecursively,
    UrlsFromCsv,
    Pdf,
    Html,
}

impl SourceFormat {
    pub const LOADABLE: [SourceFormat; 7] = [
        SourceFormat::Folder,
        SourceFormat::Txt,
        SourceFormat::Csv,
        SourceFormat::Urls,
        SourceFormat::UrlsRecursively,
        SourceFormat::UrlsFromCsv,
        SourceFormat::Pdf,
    ];

    /// Parses a user-typed tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "folder" => Some(Self::Folder),
            "txt" => Some(Self::Txt),
            "csv" => Some(Self::Csv),
            "urls" => Some(Self::Urls),
            "urls_recursively" => Some(Self::UrlsRecursively),
            "urls_from_csv" => Some(Self::UrlsFromCsv),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Urls => "urls",
            Self::UrlsRecursively => "urls_recursively",
            Self::UrlsFromCsv => "urls_from_csv",
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub document_id: String,
    pub source: String,
    pub kind: SourceFormat,
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    /// Builds a document whose id is derived from `source` and an optional
    /// locator inside it (a CSV row number, for example).
    pub fn new(
        kind: SourceFormat,
        source: impl Into<String>,
        locator: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), source.clone());

        Self {
            document_id: document_id(&source, locator),
            source,
            kind,
            text: text.into(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn document_id(source: &str, locator: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    if let Some(locator) = locator {
        hasher.update([0u8]);
        hasher.update(locator.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub source: String,
    pub chunk_index: u64,
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Squared L2 distance to the query; lower is closer.
    pub distance: f32,
    pub rank: usize,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub crawl_max_depth: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_500,
            chunk_overlap: 200,
            crawl_max_depth: 7,
            fetch_timeout_secs: 30,
        }
    }
}
