use crate::traits::VectorIndex;
use crate::{Chunk, IndexError, SearchHit};
use std::collections::HashSet;
use tracing::info;

pub const METRIC_SQUARED_L2: &str = "l2";

/// Exact-search index holding vectors row-major next to their chunks.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    embedding_model: String,
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
    ids: HashSet<String>,
}

impl FlatIndex {
    pub fn new(dimension: usize, embedding_model: impl Into<String>) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::InvalidArgument(
                "index dimension must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            embedding_model: embedding_model.into(),
            chunks: Vec::new(),
            vectors: Vec::new(),
            ids: HashSet::new(),
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.ids.contains(chunk_id)
    }

    fn check_dimension(&self, got: usize) -> Result<(), IndexError> {
        if got != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got,
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        {
            let mut incoming = HashSet::with_capacity(chunks.len());
            for (chunk, vector) in chunks.iter().zip(&vectors) {
                self.check_dimension(vector.len())?;
                if self.ids.contains(&chunk.chunk_id) || !incoming.insert(chunk.chunk_id.as_str())
                {
                    return Err(IndexError::DuplicateId(chunk.chunk_id.clone()));
                }
            }
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            self.ids.insert(chunk.chunk_id.clone());
            self.chunks.push(chunk);
            self.vectors.extend(vector);
        }

        Ok(())
    }

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.check_dimension(query_vector.len())?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| (position, squared_l2(query_vector, row)))
            .collect();

        scored.sort_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (position, distance))| SearchHit {
                chunk: self.chunks[position].clone(),
                distance,
                rank,
            })
            .collect())
    }

    fn merge_from(&mut self, other: Self) -> Result<(), IndexError> {
        self.check_dimension(other.dimension)?;
        if other.embedding_model != self.embedding_model {
            return Err(IndexError::ModelMismatch {
                expected: self.embedding_model.clone(),
                got: other.embedding_model,
            });
        }

        let mut skipped = 0usize;
        let FlatIndex { chunks, vectors, .. } = other;
        self.vectors.reserve(vectors.len());
        for (chunk, row) in chunks.into_iter().zip(vectors.chunks_exact(self.dimension)) {
            if !self.ids.insert(chunk.chunk_id.clone()) {
                skipped += 1;
                continue;
            }
            self.chunks.push(chunk);
            self.vectors.extend_from_slice(row);
        }

        if skipped > 0 {
            info!(skipped, "entries already indexed were not merged again");
        }
        Ok(())
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            document_id: format!("doc-{id}"),
            source: format!("/tmp/{id}.txt"),
            chunk_index: 0,
            text: format!("text of {id}"),
            metadata: Metadata::new(),
        }
    }

    fn index(ids: &[(&str, [f32; 2])]) -> FlatIndex {
        let mut index = FlatIndex::new(2, "test-model").expect("dimension is positive");
        index
            .add(
                ids.iter().map(|(id, _)| chunk(id)).collect(),
                ids.iter().map(|(_, vector)| vector.to_vec()).collect(),
            )
            .expect("valid entries");
        index
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            FlatIndex::new(0, "m"),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn add_validates_before_mutating() {
        let mut target = index(&[("a", [0.0, 0.0])]);

        let wrong_dim = target.add(vec![chunk("b")], vec![vec![1.0, 2.0, 3.0]]);
        assert!(matches!(wrong_dim, Err(IndexError::DimensionMismatch { expected: 2, got: 3 })));

        let duplicate = target.add(vec![chunk("c"), chunk("a")], vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
        assert!(matches!(duplicate, Err(IndexError::DuplicateId(id)) if id == "a"));

        let mismatch = target.add(vec![chunk("d")], Vec::new());
        assert!(matches!(mismatch, Err(IndexError::CountMismatch { .. })));

        assert_eq!(target.len(), 1);
        assert!(!target.contains("c"));
    }

    #[test]
    fn search_orders_by_distance_then_insertion() {
        let target = index(&[
            ("far", [10.0, 10.0]),
            ("near", [1.0, 0.0]),
            ("tie", [0.0, 1.0]),
            ("exact", [0.0, 0.0]),
        ]);

        let hits = target.search(&[0.0, 0.0], 3).expect("search");
        let ids: Vec<_> = hits.iter().map(|hit| hit.chunk.chunk_id.as_str()).collect();

        assert_eq!(ids, vec!["exact", "near", "tie"]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].rank, 2);

        assert!(matches!(
            target.search(&[0.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
        assert!(target.search(&[0.0, 0.0], 0).expect("search").is_empty());
    }

    #[test]
    fn merged_search_matches_union() {
        let left = index(&[("a", [0.0, 0.0]), ("b", [5.0, 5.0])]);
        let right = index(&[("c", [1.0, 1.0]), ("d", [-3.0, 0.0])]);
        let union = index(&[
            ("a", [0.0, 0.0]),
            ("b", [5.0, 5.0]),
            ("c", [1.0, 1.0]),
            ("d", [-3.0, 0.0]),
        ]);

        let mut merged = left.clone();
        merged.merge_from(right).expect("compatible indexes");

        for query in [[0.5, 0.5], [4.0, 4.0], [-2.0, 0.1]] {
            let expected: Vec<_> = union
                .search(&query, 3)
                .expect("search")
                .into_iter()
                .map(|hit| hit.chunk.chunk_id)
                .collect();
            let got: Vec<_> = merged
                .search(&query, 3)
                .expect("search")
                .into_iter()
                .map(|hit| hit.chunk.chunk_id)
                .collect();
            assert_eq!(got, expected);
        }
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.vector(3), Some(&[-3.0f32, 0.0][..]));
    }

    #[test]
    fn merge_rejects_incompatible_indexes() {
        let mut target = index(&[("a", [0.0, 0.0])]);

        let mut other_model = FlatIndex::new(2, "other-model").expect("index");
        other_model
            .add(vec![chunk("z")], vec![vec![1.0, 1.0]])
            .expect("add");
        assert!(matches!(
            target.merge_from(other_model),
            Err(IndexError::ModelMismatch { .. })
        ));

        let other_dim = FlatIndex::new(3, "test-model").expect("index");
        assert!(matches!(
            target.merge_from(other_dim),
            Err(IndexError::DimensionMismatch { .. })
        ));

        assert_eq!(target.len(), 1);
    }

    #[test]
    fn merge_keeps_entries_already_indexed_once() {
        let mut target = index(&[("shared", [0.0, 0.0])]);
        let overlapping = index(&[("shared", [0.0, 0.0]), ("b", [3.0, 4.0])]);

        target.merge_from(overlapping).expect("overlap merges");
        let snapshot = target.clone();
        target.merge_from(snapshot).expect("self merge");

        let ids: Vec<_> = target.chunks().iter().map(|chunk| chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["shared", "b"]);
        assert_eq!(target.vector(1), Some(&[3.0f32, 4.0][..]));
        assert_eq!(target.raw_vectors().len(), 4);
    }
}
