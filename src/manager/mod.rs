//! Artifact manager
//!
//! Orchestrates the pipeline: sanitize, store, render, archive. Every
//! operation goes through one `ArtifactManager`, which is cheap to clone and
//! shares its state behind an `Arc`.
//!
//! ```text
//! descriptor ─► classifier ─► sanitizer ─► store ─► event
//!                                            │
//! render(id, container) ─► registry ─► library loader ─► renderer ─► render state ─► event
//! ```
//!
//! Render state is tracked per (artifact, container) pair with a generation
//! number: when two renders overlap, only the most recently started one
//! mounts its output and records its outcome. A container holds one artifact
//! at a time; rendering another artifact into it retires the previous
//! occupant's render state there.
//!
//! Events are sent while the store lock is held, so subscribers see them in
//! the order the store applied the changes.

pub mod descriptor;
pub mod events;

pub use descriptor::{resolve_type_name, ArtifactDescriptor};
pub use events::{ArtifactEvent, ArtifactEventKind};

use crate::artifact::{
    Artifact, ArtifactStore, ArtifactType, ChangeType, HistoryEntry, MetadataHints, RenderState,
    RenderStatus,
};
use crate::classifier::{Classification, Classifier};
use crate::config::{ArtifactConfig, ManagerConfig};
use crate::error::{Error, Result};
use crate::library::{HttpFetcher, LibraryFetcher, LibraryLoader};
use crate::render::code::normalize_language;
use crate::render::{Container, RenderOptions, Renderer, RendererHandle, RendererRegistry};
use crate::sanitizer::ContentSanitizer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Artifact lifecycle orchestrator
#[derive(Clone)]
pub struct ArtifactManager {
    inner: Arc<ManagerInner>,
}

/// A container and the artifact currently mounted in it
struct Mount {
    container: Arc<Container>,
    artifact_id: String,
}

struct ManagerInner {
    config: ManagerConfig,
    classifier: Classifier,
    sanitizer: ContentSanitizer,
    store: ArtifactStore,
    registry: RendererRegistry,
    loader: LibraryLoader,
    events: broadcast::Sender<ArtifactEvent>,
    containers: RwLock<HashMap<String, Mount>>,
    generations: Mutex<HashMap<(String, String), u64>>,
    generation_seq: AtomicU64,
}

impl ArtifactManager {
    /// Create a manager that fetches libraries over HTTP.
    pub fn new(config: ArtifactConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.libraries.timeout_secs))?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a manager with a custom library fetcher.
    pub fn with_fetcher(config: ArtifactConfig, fetcher: Arc<dyn LibraryFetcher>) -> Result<Self> {
        let registry = RendererRegistry::with_defaults(&config.render)?;
        Self::with_registry(config, fetcher, registry)
    }

    /// Create a manager with a custom fetcher and renderer registry.
    pub fn with_registry(
        config: ArtifactConfig,
        fetcher: Arc<dyn LibraryFetcher>,
        registry: RendererRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.manager.event_capacity);
        let inner = ManagerInner {
            classifier: Classifier::new(config.classifier.clone())?,
            sanitizer: ContentSanitizer::new(&config.sanitizer)?,
            store: ArtifactStore::new(),
            loader: LibraryLoader::new(&config.libraries, fetcher)?,
            registry,
            events,
            containers: RwLock::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            generation_seq: AtomicU64::new(0),
            config: config.manager,
        };

        tracing::debug!(
            renderers = inner.registry.types().len(),
            await_rerender = inner.config.await_rerender,
            "Artifact manager ready"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Create a new artifact from raw content.
    ///
    /// An empty id is replaced by a generated one. Content is sanitized
    /// before it reaches the store; a rejected artifact is never stored.
    pub async fn create_artifact(
        &self,
        id: &str,
        artifact_type: ArtifactType,
        raw_content: &str,
        mut hints: MetadataHints,
    ) -> Result<Artifact> {
        let id = if id.trim().is_empty() {
            generate_id()
        } else {
            id.to_string()
        };

        let content = self.inner.sanitizer.sanitize(raw_content, artifact_type)?;

        if artifact_type == ArtifactType::Code {
            hints.language = match hints.language.as_deref() {
                Some(language) => Some(normalize_language(language)),
                None if self.inner.config.auto_detect_language => Some(
                    self.inner
                        .classifier
                        .detect_language(&content)
                        .unwrap_or("text")
                        .to_string(),
                ),
                None => None,
            };
        }

        let artifact = Artifact::new(id, artifact_type, content, hints);
        self.inner
            .store
            .insert_with(artifact.clone(), |stored| {
                self.emit(ArtifactEvent::Created {
                    artifact: stored.clone(),
                });
            })
            .await?;

        tracing::info!(
            artifact_id = %artifact.id,
            artifact_type = %artifact.artifact_type,
            title = %artifact.metadata.title,
            "Artifact created"
        );

        Ok(artifact)
    }

    /// Store a new revision of an artifact.
    ///
    /// Containers showing a ready rendering of the artifact are re-rendered
    /// with the new content, detached unless `manager.await_rerender` is set.
    pub async fn update_artifact(
        &self,
        id: &str,
        raw_content: &str,
        change_type: ChangeType,
    ) -> Result<Artifact> {
        if change_type == ChangeType::Create {
            return Err(Error::InvalidChangeType(change_type.to_string()));
        }

        let artifact_type = self
            .inner
            .store
            .get(id)
            .await
            .map(|a| a.artifact_type)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let content = self.inner.sanitizer.sanitize(raw_content, artifact_type)?;

        let (artifact, ready) = self
            .inner
            .store
            .modify(id, |a| {
                a.apply_revision(content, change_type)?;
                self.emit(ArtifactEvent::Updated {
                    artifact: a.clone(),
                    change_type,
                });
                Ok((a.clone(), a.ready_containers()))
            })
            .await?;

        tracing::info!(
            artifact_id = %artifact.id,
            version = artifact.metadata.version,
            change_type = %change_type,
            "Artifact updated"
        );

        for container_id in ready {
            // Skip containers another artifact has taken over since
            let Some(container) = self.mounted(&container_id, id).await else {
                continue;
            };

            if self.inner.config.await_rerender {
                if let Err(e) = self.render_artifact(id, &container).await {
                    tracing::warn!(artifact_id = %id, container_id = %container_id, error = %e, "Re-render failed");
                }
            } else {
                let manager = self.clone();
                let id = id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = manager.render_artifact(&id, &container).await {
                        tracing::warn!(artifact_id = %id, container_id = %container_id, error = %e, "Re-render failed");
                    }
                });
            }
        }

        Ok(artifact)
    }

    /// Render an artifact into a container.
    ///
    /// Loads the renderer's and the artifact's libraries first, then renders
    /// the content current at that moment into a staging container. The
    /// output is mounted only if no newer render of the container started
    /// meanwhile. Failures are recorded in the artifact's render state and
    /// returned; content and history are never touched by a render.
    pub async fn render_artifact(
        &self,
        id: &str,
        container: &Arc<Container>,
    ) -> Result<RendererHandle> {
        let container_id = container.id().to_string();
        let artifact = self
            .inner
            .store
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let (generation, previous) = {
            let mut containers = self.inner.containers.write().await;
            let previous = containers
                .insert(
                    container_id.clone(),
                    Mount {
                        container: Arc::clone(container),
                        artifact_id: id.to_string(),
                    },
                )
                .map(|mount| mount.artifact_id)
                .filter(|previous| previous != id);
            if let Some(previous) = &previous {
                self.forget_generation(previous, &container_id);
            }
            (self.next_generation(id, &container_id), previous)
        };
        if let Some(previous) = previous {
            self.retire(&previous, &container_id).await;
        }

        let version = artifact.metadata.version;
        self.inner
            .store
            .modify(id, |a| {
                if self.is_current(id, &container_id, generation) {
                    a.render_states.insert(
                        container_id.clone(),
                        RenderState::rendering(&container_id, version),
                    );
                }
                Ok(())
            })
            .await?;

        tracing::debug!(
            artifact_id = %id,
            container_id = %container_id,
            generation,
            "Rendering artifact"
        );

        let outcome = match self.prepare_render(&artifact).await {
            Ok((renderer, current, options)) => {
                let staging = Container::new(container_id.clone());
                let rendered = renderer.render(&current.content, &staging, &options).await;
                let mounted = container
                    .adopt_if(&staging, || self.is_current(id, &container_id, generation))
                    .await;
                if !mounted {
                    tracing::debug!(
                        artifact_id = %id,
                        container_id = %container_id,
                        generation,
                        "Superseded render not mounted"
                    );
                }
                rendered.map(|handle| (handle, current.metadata.version))
            }
            Err(e) => Err(e),
        };
        self.record_outcome(id, &container_id, generation, outcome)
            .await
    }

    /// Resolve the renderer, load libraries and re-read the content to render.
    async fn prepare_render(
        &self,
        artifact: &Artifact,
    ) -> Result<(Arc<dyn Renderer>, Artifact, RenderOptions)> {
        let renderer = self.inner.registry.get(artifact.artifact_type)?;

        let mut names: Vec<String> = renderer
            .required_libraries()
            .iter()
            .map(|n| n.to_string())
            .collect();
        names.extend(artifact.metadata.libraries.iter().cloned());
        let libraries = if names.is_empty() {
            Vec::new()
        } else {
            self.inner.loader.load_all(&names).await?
        };

        // Content may have changed while libraries loaded
        let current = self
            .inner
            .store
            .get(&artifact.id)
            .await
            .ok_or_else(|| Error::NotFound(artifact.id.clone()))?;

        let options = RenderOptions {
            libraries,
            language: current.metadata.language.clone(),
        };
        Ok((renderer, current, options))
    }

    /// Drop an artifact's render state for a container it no longer occupies
    async fn retire(&self, id: &str, container_id: &str) {
        let retired = self
            .inner
            .store
            .modify(id, |a| {
                // Retaken meanwhile
                if self.has_generation(id, container_id) {
                    return Ok(false);
                }
                Ok(a.render_states.remove(container_id).is_some())
            })
            .await
            .unwrap_or(false);
        if retired {
            tracing::debug!(
                artifact_id = %id,
                container_id = %container_id,
                "Render state retired"
            );
        }
    }

    async fn record_outcome(
        &self,
        id: &str,
        container_id: &str,
        generation: u64,
        outcome: Result<(RendererHandle, u32)>,
    ) -> Result<RendererHandle> {
        let state = match &outcome {
            Ok((handle, version)) => RenderState {
                container_id: container_id.to_string(),
                status: RenderStatus::Ready,
                error: None,
                handle: Some(handle.clone()),
                version: *version,
            },
            Err(e) => RenderState {
                container_id: container_id.to_string(),
                status: RenderStatus::Error,
                error: Some(e.to_string()),
                handle: None,
                version: 0,
            },
        };

        let recorded = self
            .inner
            .store
            .modify(id, |a| {
                if !self.is_current(id, container_id, generation) {
                    return Ok(None);
                }
                let mut state = state;
                if state.status == RenderStatus::Error {
                    state.version = a
                        .render_states
                        .get(container_id)
                        .map(|s| s.version)
                        .unwrap_or(a.metadata.version);
                }
                a.render_states.insert(container_id.to_string(), state.clone());
                self.emit(ArtifactEvent::Rendered {
                    artifact: a.clone(),
                    container_id: container_id.to_string(),
                    version: state.version,
                    status: state.status,
                    handle: state.handle.clone(),
                    error: state.error.clone(),
                });
                Ok(Some(state))
            })
            .await?;

        match recorded {
            Some(state) => {
                match &state.error {
                    None => tracing::info!(
                        artifact_id = %id,
                        container_id = %container_id,
                        version = state.version,
                        "Artifact rendered"
                    ),
                    Some(error) => tracing::warn!(
                        artifact_id = %id,
                        container_id = %container_id,
                        error = %error,
                        "Artifact render failed"
                    ),
                }
            }
            None => tracing::debug!(
                artifact_id = %id,
                container_id = %container_id,
                generation,
                "Render superseded by a newer request"
            ),
        }

        outcome.map(|(handle, _)| handle)
    }

    /// Archive an artifact. Returns false for unknown ids; archiving twice
    /// returns true without emitting a second event.
    pub async fn archive_artifact(&self, id: &str) -> bool {
        let archived = self
            .inner
            .store
            .modify(id, |a| {
                let archived = a.archive();
                if archived {
                    self.emit(ArtifactEvent::Archived {
                        artifact_id: id.to_string(),
                    });
                }
                Ok(archived)
            })
            .await;
        match archived {
            Ok(true) => {
                tracing::info!(artifact_id = %id, "Artifact archived");
                true
            }
            Ok(false) => true,
            Err(_) => false,
        }
    }

    /// Snapshot of an artifact
    pub async fn get_artifact(&self, id: &str) -> Option<Artifact> {
        self.inner.store.get(id).await
    }

    /// All artifacts, archived included, oldest first
    pub async fn get_all_artifacts(&self) -> Vec<Artifact> {
        self.inner.store.all().await
    }

    /// All artifacts of one type
    pub async fn find_by_type(&self, artifact_type: ArtifactType) -> Vec<Artifact> {
        self.inner.store.find_by_type(artifact_type).await
    }

    /// Version history of an artifact
    pub async fn history(&self, id: &str) -> Option<Vec<HistoryEntry>> {
        self.inner.store.get(id).await.map(|a| a.history)
    }

    /// Render state of an artifact in one container
    pub async fn render_state(&self, id: &str, container_id: &str) -> Option<RenderState> {
        self.inner
            .store
            .get(id)
            .await
            .and_then(|a| a.render_states.get(container_id).cloned())
    }

    /// Container previously used for rendering
    pub async fn container(&self, container_id: &str) -> Option<Arc<Container>> {
        self.inner
            .containers
            .read()
            .await
            .get(container_id)
            .map(|mount| Arc::clone(&mount.container))
    }

    /// Id of the artifact most recently rendered into a container
    pub async fn occupant(&self, container_id: &str) -> Option<String> {
        self.inner
            .containers
            .read()
            .await
            .get(container_id)
            .map(|mount| mount.artifact_id.clone())
    }

    /// Detach a container the host no longer shows.
    ///
    /// Forgets the container, drops its occupant's render state there and
    /// clears its children. Renders still in flight for it are not mounted.
    /// Returns false for unknown containers.
    pub async fn release_container(&self, container_id: &str) -> bool {
        let mount = {
            let mut containers = self.inner.containers.write().await;
            let mount = containers.remove(container_id);
            if let Some(mount) = &mount {
                self.forget_generation(&mount.artifact_id, container_id);
            }
            mount
        };
        let Some(mount) = mount else {
            return false;
        };

        self.retire(&mount.artifact_id, container_id).await;
        mount.container.clear().await;
        tracing::debug!(
            artifact_id = %mount.artifact_id,
            container_id = %container_id,
            "Container released"
        );
        true
    }

    async fn mounted(&self, container_id: &str, id: &str) -> Option<Arc<Container>> {
        self.inner
            .containers
            .read()
            .await
            .get(container_id)
            .filter(|mount| mount.artifact_id == id)
            .map(|mount| Arc::clone(&mount.container))
    }

    /// Classify content against the user's request
    pub fn classify(&self, content: &str, user_intent: &str) -> Classification {
        self.inner.classifier.classify(content, user_intent)
    }

    /// Accept an extracted descriptor.
    ///
    /// Known ids are treated as a correction of earlier output and stored as
    /// a `rewrite`. Unrecognized type names fall back to content detection.
    pub async fn ingest(
        &self,
        descriptor: ArtifactDescriptor,
        user_intent: &str,
    ) -> Result<Artifact> {
        if !descriptor.id.is_empty() && self.inner.store.contains(&descriptor.id).await {
            return self
                .update_artifact(&descriptor.id, &descriptor.content, ChangeType::Rewrite)
                .await;
        }

        let (artifact_type, language) = match descriptor.resolve_type() {
            Some(resolved) => resolved,
            None => {
                let classification = self.classify(&descriptor.content, user_intent);
                tracing::debug!(
                    type_name = %descriptor.type_name,
                    detected = %classification.artifact_type,
                    ambiguous = classification.ambiguous,
                    "Descriptor type not recognized, using detection"
                );
                (classification.artifact_type, classification.language)
            }
        };

        let mut hints = MetadataHints::new().title(descriptor.title);
        hints.language = language;

        self.create_artifact(&descriptor.id, artifact_type, &descriptor.content, hints)
            .await
    }

    /// Subscribe to all lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ArtifactEvent> {
        self.inner.events.subscribe()
    }

    /// Run `handler` for every event of one kind.
    ///
    /// The listener runs on its own task until the manager is dropped or the
    /// returned handle is aborted.
    pub fn on<F>(&self, kind: ArtifactEventKind, handler: F) -> JoinHandle<()>
    where
        F: Fn(ArtifactEvent) + Send + Sync + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.kind() == kind => handler(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, event = %kind, "Artifact event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        })
    }

    /// Library loader shared by all renders
    pub fn loader(&self) -> &LibraryLoader {
        &self.inner.loader
    }

    fn emit(&self, event: ArtifactEvent) {
        // No subscribers is not an error
        let _ = self.inner.events.send(event);
    }

    fn next_generation(&self, id: &str, container_id: &str) -> u64 {
        // Global sequence, so a retired pair never reuses an old number
        let generation = self.inner.generation_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((id.to_string(), container_id.to_string()), generation);
        generation
    }

    fn forget_generation(&self, id: &str, container_id: &str) {
        self.inner
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(id.to_string(), container_id.to_string()));
    }

    fn has_generation(&self, id: &str, container_id: &str) -> bool {
        self.inner
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(id.to_string(), container_id.to_string()))
    }

    fn is_current(&self, id: &str, container_id: &str, generation: u64) -> bool {
        let generations = self
            .inner
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        generations.get(&(id.to_string(), container_id.to_string())) == Some(&generation)
    }
}

/// Fresh artifact id
pub fn generate_id() -> String {
    format!("artifact_{}", uuid::Uuid::new_v4())
}
