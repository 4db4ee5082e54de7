pub mod flat;
pub mod persist;

pub use flat::FlatIndex;
pub use persist::{read_manifest, IndexManifest, DOCSTORE_FILE, VECTORS_FILE};
