//! Playlist model, integrity verification, retrieval and persistence.

/// Checksum canonicalization and verification
pub mod integrity;
/// Wire-format data types
pub mod model;
/// Fetching raw playlist documents
pub mod fetch;
/// Key/value persistence boundary
pub mod store;
/// Structural validation
pub mod validate;

// Re-export key components
pub use fetch::{HttpPlaylistFetcher, PlaylistFetcher};
pub use integrity::IntegrityMode;
pub use model::{ActionKind, Cue, CueAction, Playlist, PlaylistMetadata, Scene};
pub use store::{FileStore, KeyValueStore, MemoryStore};
