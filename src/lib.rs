//! Artifact Sandbox - isolated rendering of LLM-generated artifacts
//!
//! Content extracted from assistant output (HTML pages, interactive
//! components, SVG, markdown, source code) becomes a versioned artifact:
//! classified, sanitized against type-specific risk rules, stored with an
//! append-only history, and rendered into a container under the isolation
//! policy of its type.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ArtifactManager                            │
//! │                                                                   │
//! │  descriptor ──► Classifier ──► Sanitizer ──► ArtifactStore        │
//! │                 (score, type)  (strip/reject)  (versions, history) │
//! │                                                     │             │
//! │  render(id, container)                              ▼             │
//! │        │                                     lifecycle events     │
//! │        ▼                                 (created, updated,       │
//! │  RendererRegistry ──► LibraryLoader        rendered, archived)   │
//! │        │              (shared, ordered)                           │
//! │        ▼                                                          │
//! │  ┌──────────┬─────────────┬─────────┬──────────┬──────────┐       │
//! │  │   html   │  component  │   svg   │   code   │ markdown │       │
//! │  │ sandboxed│  sandboxed  │ static  │ escaped  │ escaped  │       │
//! │  │ document │ + curated   │ wrapper │ + tokens │  blocks  │       │
//! │  │          │ capabilities│         │          │          │       │
//! │  └──────────┴─────────────┴─────────┴──────────┴──────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`artifact`]: Artifact model, history and in-memory store
//! - [`classifier`]: Artifact-worthiness scoring and type detection
//! - [`sanitizer`]: Markup stripping and component risk rules
//! - [`render`]: Renderer registry, containers and the built-in renderers
//! - [`library`]: Runtime library catalog and loader
//! - [`manager`]: Lifecycle orchestration and events
//! - [`config`]: Configuration management

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod error;
pub mod library;
pub mod manager;
pub mod render;
pub mod sanitizer;

pub use artifact::{Artifact, ArtifactType, ChangeType, MetadataHints, RenderStatus};
pub use config::ArtifactConfig;
pub use error::{Error, Result};
pub use manager::{ArtifactDescriptor, ArtifactEvent, ArtifactEventKind, ArtifactManager};
pub use render::{Container, RendererHandle};
