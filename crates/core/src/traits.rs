use crate::{Chunk, IndexError, SearchHit};

/// Nearest-neighbour index over embedded chunks.
pub trait VectorIndex {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<(), IndexError>;

    fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError>;

    fn merge_from(&mut self, other: Self) -> Result<(), IndexError>
    where
        Self: Sized;
}
