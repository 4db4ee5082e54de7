use super::flat::{FlatIndex, METRIC_SQUARED_L2};
use crate::traits::VectorIndex;
use crate::{Chunk, IndexError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub const FORMAT_VERSION: u32 = 1;
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTORS_FILE: &str = "vectors.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub index_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: String,
    pub count: usize,
    pub vectors_sha256: String,
    pub entries: Vec<Chunk>,
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn corrupt(dir: &Path, details: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        path: dir.display().to_string(),
        details: details.into(),
    }
}

impl FlatIndex {
    /// Writes `docstore.json` and `vectors.bin` (little-endian f32 rows)
    /// into `dir`, creating it if needed.
    pub fn save_local(&self, dir: &Path) -> Result<IndexManifest, IndexError> {
        fs::create_dir_all(dir)?;

        let bytes = self
            .raw_vectors()
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect::<Vec<u8>>();

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            index_id: Uuid::new_v4(),
            created_at: Utc::now(),
            embedding_model: self.embedding_model().to_string(),
            dimension: self.dimension(),
            metric: METRIC_SQUARED_L2.to_string(),
            count: self.len(),
            vectors_sha256: digest(&bytes),
            entries: self.chunks().to_vec(),
        };

        fs::write(dir.join(VECTORS_FILE), &bytes)?;
        fs::write(dir.join(DOCSTORE_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        Ok(manifest)
    }

    pub fn load_local(dir: &Path) -> Result<Self, IndexError> {
        let manifest = read_manifest(dir)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(manifest.format_version));
        }
        if manifest.metric != METRIC_SQUARED_L2 {
            return Err(corrupt(dir, format!("unknown metric {}", manifest.metric)));
        }
        if manifest.entries.len() != manifest.count {
            return Err(corrupt(
                dir,
                format!(
                    "manifest lists {} entries but count is {}",
                    manifest.entries.len(),
                    manifest.count
                ),
            ));
        }

        let expected_len = manifest
            .count
            .checked_mul(manifest.dimension)
            .and_then(|values| values.checked_mul(4))
            .ok_or_else(|| {
                corrupt(
                    dir,
                    format!(
                        "count {} and dimension {} overflow the vector size",
                        manifest.count, manifest.dimension
                    ),
                )
            })?;
        let bytes = fs::read(dir.join(VECTORS_FILE))?;
        if bytes.len() != expected_len {
            return Err(corrupt(
                dir,
                format!("{VECTORS_FILE} has {} bytes, expected {expected_len}", bytes.len()),
            ));
        }
        if digest(&bytes) != manifest.vectors_sha256 {
            return Err(corrupt(dir, format!("{VECTORS_FILE} checksum mismatch")));
        }

        let values = bytes
            .chunks_exact(4)
            .map(|raw| {
                let mut buffer = [0u8; 4];
                buffer.copy_from_slice(raw);
                f32::from_le_bytes(buffer)
            })
            .collect::<Vec<f32>>();
        let rows = if manifest.dimension == 0 {
            Vec::new()
        } else {
            values
                .chunks_exact(manifest.dimension)
                .map(<[f32]>::to_vec)
                .collect()
        };

        let mut index = FlatIndex::new(manifest.dimension, manifest.embedding_model)?;
        index.add(manifest.entries, rows)?;
        Ok(index)
    }
}

pub fn read_manifest(dir: &Path) -> Result<IndexManifest, IndexError> {
    let raw = fs::read(dir.join(DOCSTORE_FILE))?;
    Ok(serde_json::from_slice(&raw)?)
}
