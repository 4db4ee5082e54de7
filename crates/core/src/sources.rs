use crate::ingest::{load_csv, load_folder, load_pdf, load_text, read_csv_column, LoadReport};
use crate::models::{IngestionOptions, SourceFormat};
use crate::web::{normalize_urls, parse_url_list, WebLoader};
use crate::IngestError;
use std::path::PathBuf;
use tracing::info;
use url::Url;

/// A format tag together with the arguments its loader needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    Folder { path: PathBuf, glob: String },
    Txt { path: PathBuf },
    Csv { path: PathBuf },
    Pdf { path: PathBuf },
    Urls { urls: String },
    UrlsRecursively { url: String },
    UrlsFromCsv { path: PathBuf, column: String },
}

impl SourceRequest {
    pub fn format(&self) -> SourceFormat {
        match self {
            Self::Folder { .. } => SourceFormat::Folder,
            Self::Txt { .. } => SourceFormat::Txt,
            Self::Csv { .. } => SourceFormat::Csv,
            Self::Pdf { .. } => SourceFormat::Pdf,
            Self::Urls { .. } => SourceFormat::Urls,
            Self::UrlsRecursively { .. } => SourceFormat::UrlsRecursively,
            Self::UrlsFromCsv { .. } => SourceFormat::UrlsFromCsv,
        }
    }
}

pub async fn load_source(
    request: &SourceRequest,
    options: &IngestionOptions,
) -> Result<LoadReport, IngestError> {
    let report = match request {
        SourceRequest::Folder { path, glob } => load_folder(path, glob)?,
        SourceRequest::Txt { path } => LoadReport::from_documents(load_text(path)?),
        SourceRequest::Csv { path } => LoadReport::from_documents(load_csv(path)?),
        SourceRequest::Pdf { path } => LoadReport::from_documents(load_pdf(path)?),
        SourceRequest::Urls { urls } => {
            let list = parse_url_list(urls)?;
            WebLoader::new(options)?.load_url_list(list).await
        }
        SourceRequest::UrlsRecursively { url } => {
            let root = Url::parse(url.trim())?;
            WebLoader::new(options)?.crawl(&root).await
        }
        SourceRequest::UrlsFromCsv { path, column } => {
            let list = normalize_urls(read_csv_column(path, column)?)?;
            WebLoader::new(options)?.load_url_list(list).await
        }
    };

    info!(
        format = %request.format(),
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        "loaded documents"
    );
    Ok(report)
}
