//! Artifact model and store
//!
//! Versioned artifacts with append-only history, held in an in-memory
//! store that never hard-deletes.

pub mod store;
pub mod types;

pub use store::ArtifactStore;
pub use types::{
    Artifact, ArtifactMetadata, ArtifactType, ChangeType, HistoryEntry, MetadataHints,
    RenderState, RenderStatus,
};
