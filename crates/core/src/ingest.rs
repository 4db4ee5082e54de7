use crate::extractor::{extract_page_texts, join_pages};
use crate::models::{Document, SourceFormat};
use crate::web::html_to_text;
use crate::IngestError;
use csv::ReaderBuilder;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DEFAULT_FOLDER_GLOB: &str = "**/*";

#[derive(Debug, Clone)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedSource>,
}

impl LoadReport {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            documents,
            skipped: Vec::new(),
        }
    }

    pub fn skip(&mut self, source: impl Into<String>, reason: impl ToString) {
        self.skipped.push(SkippedSource {
            source: source.into(),
            reason: reason.to_string(),
        });
    }
}

/// Resolves a user supplied path against the input root. Absolute paths are
/// returned unchanged.
pub fn resolve_input_path(input_root: &Path, user_path: &str) -> PathBuf {
    let trimmed = Path::new(user_path.trim());
    if trimmed.is_absolute() {
        trimmed.to_path_buf()
    } else {
        input_root.join(trimmed)
    }
}

fn source_of(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub fn load_text(path: &Path) -> Result<Vec<Document>, IngestError> {
    let text = fs::read_to_string(path)?;
    Ok(vec![Document::new(SourceFormat::Txt, source_of(path), None, text)])
}

/// One document per data row, rendered as `header: value` lines.
pub fn load_csv(path: &Path) -> Result<Vec<Document>, IngestError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let source = source_of(path);

    let mut documents = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        let row = row.to_string();
        documents.push(
            Document::new(SourceFormat::Csv, source.clone(), Some(&row), text)
                .with_metadata("row", row),
        );
    }

    Ok(documents)
}

/// Collects the non-empty values of one CSV column.
pub fn read_csv_column(path: &Path, column: &str) -> Result<Vec<String>, IngestError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let wanted = column.trim();
    let position = reader
        .headers()?
        .iter()
        .position(|header| header.trim() == wanted)
        .ok_or_else(|| IngestError::MissingColumn {
            column: wanted.to_string(),
            path: source_of(path),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(position).map(str::trim) {
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }
    }

    Ok(values)
}

pub fn load_pdf(path: &Path) -> Result<Vec<Document>, IngestError> {
    let pages = extract_page_texts(path)?;
    let text = join_pages(&pages);
    Ok(vec![Document::new(SourceFormat::Pdf, source_of(path), None, text)
        .with_metadata("pages", pages.len().to_string())])
}

pub fn load_html_file(path: &Path) -> Result<Vec<Document>, IngestError> {
    let raw = fs::read_to_string(path)?;
    let page = html_to_text(&raw);
    let mut document = Document::new(SourceFormat::Html, source_of(path), None, page.text);
    if let Some(title) = page.title {
        document = document.with_metadata("title", title);
    }
    Ok(vec![document])
}

/// Loads one file, choosing the loader from its extension. Unknown
/// extensions are read as UTF-8 text.
pub fn load_file(path: &Path) -> Result<Vec<Document>, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => load_pdf(path),
        "csv" => load_csv(path),
        "html" | "htm" => load_html_file(path),
        _ => load_text(path),
    }
}

/// Matching files under `folder`, sorted, plus the entries the walk could not
/// read.
pub fn discover_files(
    folder: &Path,
    glob: &str,
) -> Result<(Vec<PathBuf>, Vec<SkippedSource>), IngestError> {
    let glob = if glob.trim().is_empty() {
        DEFAULT_FOLDER_GLOB
    } else {
        glob.trim()
    };
    let pattern = Pattern::new(glob)?;

    let mut files = Vec::new();
    let mut unreadable = Vec::new();
    for item in WalkDir::new(folder).follow_links(true) {
        let entry = match item {
            Ok(entry) => entry,
            Err(error) => {
                let source = error
                    .path()
                    .map(source_of)
                    .unwrap_or_else(|| source_of(folder));
                warn!(path = %source, error = %error, "skipping unreadable entry");
                unreadable.push(SkippedSource {
                    source,
                    reason: error.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(folder).unwrap_or(entry.path());
        if pattern.matches_path(relative) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok((files, unreadable))
}

/// Loads every file under `folder` matching `glob`. Files that fail to load
/// are reported as skipped instead of aborting the whole folder.
pub fn load_folder(folder: &Path, glob: &str) -> Result<LoadReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "not a directory: {}",
            folder.display()
        )));
    }

    let (files, unreadable) = discover_files(folder, glob)?;
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no files matching {:?} found in {}",
            glob,
            folder.display()
        )));
    }

    let mut report = LoadReport {
        documents: Vec::new(),
        skipped: unreadable,
    };
    for path in files {
        match load_file(&path) {
            Ok(documents) => {
                debug!(path = %path.display(), documents = documents.len(), "loaded file");
                report.documents.extend(documents);
            }
            Err(error) => report.skip(source_of(&path), error),
        }
    }

    Ok(report)
}
