use crate::chunking::RecursiveTextSplitter;
use crate::embeddings::Embedder;
use crate::stores::FlatIndex;
use crate::traits::VectorIndex;
use crate::{Document, IndexError, SearchHit};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 512;

#[derive(Debug)]
pub struct BuildReport {
    pub index: FlatIndex,
    pub document_count: usize,
    pub chunk_count: usize,
    pub dropped_documents: Vec<String>,
}

/// Drives document splitting, embedding and index construction.
pub struct IndexCoordinator<E>
where
    E: Embedder,
{
    splitter: RecursiveTextSplitter,
    embedder: E,
    batch_size: usize,
}

impl<E> IndexCoordinator<E>
where
    E: Embedder,
{
    pub fn new(splitter: RecursiveTextSplitter, embedder: E) -> Self {
        Self {
            splitter,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub async fn build(&self, documents: &[Document]) -> Result<BuildReport, IndexError> {
        let (kept, dropped): (Vec<&Document>, Vec<&Document>) =
            documents.iter().partition(|document| !document.is_blank());
        let dropped_documents = dropped
            .into_iter()
            .map(|document| document.source.clone())
            .collect::<Vec<_>>();

        let kept = kept.into_iter().cloned().collect::<Vec<_>>();
        let chunks = self.splitter.split_documents(&kept);
        if chunks.is_empty() {
            return Err(IndexError::Empty(format!(
                "{} documents produced no text chunks",
                documents.len()
            )));
        }

        info!(
            documents = kept.len(),
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "embedding chunks"
        );

        let mut index = FlatIndex::new(self.embedder.dimensions(), self.embedder.model_name())?;
        let total_batches = chunks.len().div_ceil(self.batch_size);
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts = batch.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
            let vectors = self.embedder.embed_documents(&texts).await?;
            index.add(batch.to_vec(), vectors)?;
            debug!(batch = batch_no + 1, total_batches, "embedded batch");
        }

        Ok(BuildReport {
            document_count: kept.len(),
            chunk_count: index.len(),
            index,
            dropped_documents,
        })
    }

    pub async fn search(
        &self,
        index: &FlatIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if query.trim().is_empty() {
            return Err(IndexError::InvalidArgument("query is empty".to_string()));
        }
        if index.embedding_model() != self.embedder.model_name() {
            return Err(IndexError::ModelMismatch {
                expected: index.embedding_model().to_string(),
                got: self.embedder.model_name().to_string(),
            });
        }

        let query_vector = self.embedder.embed_query(query).await?;
        index.search(&query_vector, top_k)
    }
}

/// Loads every index in `paths` and folds them into the first one.
pub fn merge_indexes(paths: &[PathBuf]) -> Result<FlatIndex, IndexError> {
    let (first, rest) = paths
        .split_first()
        .ok_or_else(|| IndexError::InvalidArgument("no indexes to merge".to_string()))?;

    let mut merged = FlatIndex::load_local(first)?;
    for path in rest {
        let other = FlatIndex::load_local(path)?;
        debug!(path = %path.display(), entries = other.len(), "merging index");
        merged.merge_from(other)?;
    }

    info!(indexes = paths.len(), entries = merged.len(), "indexes merged");
    Ok(merged)
}

/// `<output_dir>/<prefix><name>`; the name must be a single path component.
pub fn output_path(output_dir: &Path, prefix: &str, name: &str) -> Result<PathBuf, IndexError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IndexError::InvalidArgument("index name is empty".to_string()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(IndexError::InvalidArgument(format!(
            "index name must not contain path separators: {name}"
        )));
    }
    Ok(output_dir.join(format!("{prefix}{name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SplitterConfig;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::EmbedError;
    use crate::models::SourceFormat;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingEmbedder {
        inner: CharacterNgramEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_documents(texts).await
        }
    }

    fn coordinator(chunk_size: usize) -> IndexCoordinator<CharacterNgramEmbedder> {
        let splitter = RecursiveTextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap: 4,
        })
        .expect("valid config");
        IndexCoordinator::new(splitter, CharacterNgramEmbedder::new(64))
    }

    fn documents() -> Vec<Document> {
        vec![
            Document::new(
                SourceFormat::Txt,
                "pumps.txt",
                None,
                "Hydraulic pumps need regular pressure checks.\n\nReplace seals yearly.",
            ),
            Document::new(SourceFormat::Txt, "empty.txt", None, "  \n "),
            Document::new(
                SourceFormat::Txt,
                "garden.txt",
                None,
                "Tomatoes grow best in full sun with steady watering.",
            ),
        ]
    }

    #[tokio::test]
    async fn build_drops_blank_documents_and_embeds_all_chunks() {
        let report = coordinator(60).build(&documents()).await.expect("build");

        assert_eq!(report.document_count, 2);
        assert_eq!(report.dropped_documents, vec!["empty.txt".to_string()]);
        assert_eq!(report.chunk_count, report.index.len());
        assert!(report.index.len() >= 3);
        assert!(report
            .index
            .chunks()
            .iter()
            .all(|chunk| chunk.text.chars().count() <= 60));
    }

    #[tokio::test]
    async fn build_embeds_in_batches() {
        let splitter = RecursiveTextSplitter::new(SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 0,
        })
        .expect("valid config");
        let embedder = CountingEmbedder {
            inner: CharacterNgramEmbedder::new(8),
            calls: AtomicUsize::new(0),
        };
        let coordinator = IndexCoordinator::new(splitter, embedder).with_batch_size(2);

        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let report = coordinator
            .build(&[Document::new(SourceFormat::Txt, "greek.txt", None, text)])
            .await
            .expect("build");

        let expected_calls = report.chunk_count.div_ceil(2);
        assert_eq!(coordinator.embedder().calls.load(Ordering::SeqCst), expected_calls);
    }

    #[tokio::test]
    async fn build_without_text_is_an_error() {
        let blank = vec![Document::new(SourceFormat::Txt, "blank.txt", None, "   ")];
        let result = coordinator(60).build(&blank).await;
        assert!(matches!(result, Err(IndexError::Empty(_))));
    }

    #[tokio::test]
    async fn search_finds_the_matching_document() {
        let coordinator = coordinator(200);
        let report = coordinator.build(&documents()).await.expect("build");

        let hits = coordinator
            .search(&report.index, "tomatoes in full sun", 1)
            .await
            .expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source, "garden.txt");
    }

    #[tokio::test]
    async fn merged_indexes_answer_like_one_built_from_all_documents(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let coordinator = coordinator(200);
        let docs = documents();

        let left = coordinator.build(&docs[..1]).await?;
        let right = coordinator.build(&docs[2..]).await?;
        let combined = coordinator.build(&docs).await?;

        let left_path = output_path(dir.path(), "index_", "left")?;
        let right_path = output_path(dir.path(), "index_", "right")?;
        left.index.save_local(&left_path)?;
        right.index.save_local(&right_path)?;

        let merged = merge_indexes(&[left_path, right_path])?;
        assert_eq!(merged.len(), combined.index.len());

        for query in ["pressure checks", "steady watering", "seals"] {
            let expected: Vec<_> = coordinator
                .search(&combined.index, query, 2)
                .await?
                .into_iter()
                .map(|hit| hit.chunk.chunk_id)
                .collect();
            let got: Vec<_> = coordinator
                .search(&merged, query, 2)
                .await?
                .into_iter()
                .map(|hit| hit.chunk.chunk_id)
                .collect();
            assert_eq!(got, expected);
        }
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_indexes_merge_without_duplicates(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let coordinator = coordinator(200);
        let docs = documents();

        let shared = coordinator.build(&docs[..1]).await?;
        let both = coordinator.build(&docs).await?;

        let shared_path = output_path(dir.path(), "index_", "shared")?;
        let both_path = output_path(dir.path(), "index_", "both")?;
        shared.index.save_local(&shared_path)?;
        both.index.save_local(&both_path)?;

        let merged = merge_indexes(&[shared_path.clone(), both_path])?;
        assert_eq!(merged.len(), both.index.len());

        let twice = merge_indexes(&[shared_path.clone(), shared_path])?;
        assert_eq!(twice.len(), shared.index.len());
        Ok(())
    }

    #[test]
    fn merging_nothing_is_rejected() {
        assert!(matches!(
            merge_indexes(&[]),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn output_path_uses_prefix_and_rejects_separators() {
        let dir = Path::new("./output_data");
        assert_eq!(
            output_path(dir, "index_", " manuals ").expect("valid"),
            PathBuf::from("./output_data/index_manuals")
        );
        assert!(output_path(dir, "index_", "").is_err());
        assert!(output_path(dir, "index_", "../escape").is_err());
        assert!(output_path(dir, "index_", "..").is_err());
    }
}
