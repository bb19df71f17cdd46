//! In-memory artifact store
//!
//! The single source of truth for artifacts. Provides async insert, query
//! and in-place mutation using `tokio::sync::RwLock` for concurrent access.
//! Artifacts are never removed; archiving is a metadata flag.

use super::types::{Artifact, ArtifactType};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store of artifacts keyed by id
#[derive(Clone)]
pub struct ArtifactStore {
    artifacts: Arc<RwLock<HashMap<String, Artifact>>>,
}

impl ArtifactStore {
    /// Create a new empty artifact store
    pub fn new() -> Self {
        Self {
            artifacts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a new artifact; fails if the id is already taken.
    pub async fn insert(&self, artifact: Artifact) -> Result<()> {
        self.insert_with(artifact, |_| ()).await
    }

    /// Insert, running `on_insert` while the write lock is still held
    pub async fn insert_with(
        &self,
        artifact: Artifact,
        on_insert: impl FnOnce(&Artifact),
    ) -> Result<()> {
        let mut map = self.artifacts.write().await;
        if map.contains_key(&artifact.id) {
            return Err(Error::DuplicateId(artifact.id));
        }
        on_insert(&artifact);
        map.insert(artifact.id.clone(), artifact);
        Ok(())
    }

    /// Retrieve a snapshot of an artifact by id
    pub async fn get(&self, id: &str) -> Option<Artifact> {
        self.artifacts.read().await.get(id).cloned()
    }

    /// Whether an artifact with this id exists
    pub async fn contains(&self, id: &str) -> bool {
        self.artifacts.read().await.contains_key(id)
    }

    /// All artifacts, archived included, oldest first
    pub async fn all(&self) -> Vec<Artifact> {
        let map = self.artifacts.read().await;
        let mut all: Vec<Artifact> = map.values().cloned().collect();
        all.sort_by(|a, b| {
            a.metadata
                .created
                .cmp(&b.metadata.created)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    /// All artifacts of a given type, oldest first
    pub async fn find_by_type(&self, artifact_type: ArtifactType) -> Vec<Artifact> {
        self.all()
            .await
            .into_iter()
            .filter(|a| a.artifact_type == artifact_type)
            .collect()
    }

    /// Mutate an artifact in place under the write lock.
    ///
    /// The closure's error aborts the mutation; callers must not leave the
    /// artifact half-modified before returning an error.
    pub async fn modify<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Artifact) -> Result<T>,
    ) -> Result<T> {
        let mut map = self.artifacts.write().await;
        let artifact = map
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        f(artifact)
    }

    /// Number of stored artifacts
    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}
