//! Artifact data types
//!
//! An artifact is a versioned unit of generated content (markup, component
//! code, SVG, markdown or plain code) extracted from assistant output. The
//! stored `content` is always the sanitized form; every mutation appends to
//! `history`, so `history.len() == metadata.version` holds at all times.

use crate::error::{Error, Result};
use crate::render::RendererHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A versioned artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique artifact identifier
    pub id: String,
    /// Content type, immutable after creation
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    /// Current sanitized source text
    pub content: String,
    /// Descriptive and versioning metadata
    pub metadata: ArtifactMetadata,
    /// Append-only version log
    pub history: Vec<HistoryEntry>,
    /// Transient render state per container id
    #[serde(skip)]
    pub render_states: BTreeMap<String, RenderState>,
}

impl Artifact {
    /// Assemble a version-1 artifact from already sanitized content.
    pub fn new(
        id: impl Into<String>,
        artifact_type: ArtifactType,
        sanitized_content: impl Into<String>,
        hints: MetadataHints,
    ) -> Self {
        let id = id.into();
        let content = sanitized_content.into();
        let now = Utc::now();

        Self {
            metadata: ArtifactMetadata {
                title: hints
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("Artifact {}", id)),
                description: hints.description,
                language: hints.language,
                libraries: hints.libraries,
                tags: hints.tags,
                created: now,
                last_modified: now,
                version: 1,
                archived: false,
            },
            history: vec![HistoryEntry {
                version: 1,
                content: content.clone(),
                timestamp: now,
                change_type: ChangeType::Create,
            }],
            id,
            artifact_type,
            content,
            render_states: BTreeMap::new(),
        }
    }

    /// Replace the content with a new sanitized revision, returning the new version.
    pub fn apply_revision(
        &mut self,
        sanitized_content: impl Into<String>,
        change_type: ChangeType,
    ) -> Result<u32> {
        if change_type == ChangeType::Create {
            return Err(Error::InvalidChangeType(change_type.to_string()));
        }

        let content = sanitized_content.into();
        let now = Utc::now();
        let version = self.metadata.version + 1;

        self.history.push(HistoryEntry {
            version,
            content: content.clone(),
            timestamp: now,
            change_type,
        });
        self.content = content;
        self.metadata.version = version;
        self.metadata.last_modified = now;

        Ok(version)
    }

    /// Mark the artifact archived. Returns false if it already was.
    pub fn archive(&mut self) -> bool {
        if self.metadata.archived {
            return false;
        }
        self.metadata.archived = true;
        self.metadata.last_modified = Utc::now();
        true
    }

    /// Render state for a container, if the artifact was rendered there.
    pub fn render_state(&self, container_id: &str) -> Option<&RenderState> {
        self.render_states.get(container_id)
    }

    /// Containers currently showing a ready rendering of this artifact.
    pub fn ready_containers(&self) -> Vec<String> {
        self.render_states
            .values()
            .filter(|s| s.status == RenderStatus::Ready)
            .map(|s| s.container_id.clone())
            .collect()
    }

    /// Content of a specific version from history.
    pub fn version_content(&self, version: u32) -> Option<&str> {
        self.history
            .iter()
            .find(|h| h.version == version)
            .map(|h| h.content.as_str())
    }
}

/// The closed set of artifact content types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    /// Markup rendered in a sandboxed embedded document
    Html,
    /// React-like component evaluated with curated capabilities
    InteractiveComponent,
    /// Display-only source code
    Code,
    /// Vector graphics
    Svg,
    /// Display-only markdown
    Markdown,
}

impl ArtifactType {
    /// All artifact types, in registry order
    pub const ALL: [ArtifactType; 5] = [
        Self::Html,
        Self::InteractiveComponent,
        Self::Code,
        Self::Svg,
        Self::Markdown,
    ];

    /// MIME-like name used by chat collaborators
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::InteractiveComponent => "application/vnd.artifact.react",
            Self::Code => "application/vnd.artifact.code",
            Self::Svg => "image/svg+xml",
            Self::Markdown => "text/markdown",
        }
    }

    /// Whether content of this type is ever executed
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Html | Self::InteractiveComponent)
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::InteractiveComponent => write!(f, "interactive-component"),
            Self::Code => write!(f, "code"),
            Self::Svg => write!(f, "svg"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::str::FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "html" | "text/html" => Ok(Self::Html),
            "interactive-component" | "application/vnd.artifact.react" => {
                Ok(Self::InteractiveComponent)
            }
            "code" | "application/vnd.artifact.code" => Ok(Self::Code),
            "svg" | "image/svg+xml" => Ok(Self::Svg),
            "markdown" | "text/markdown" => Ok(Self::Markdown),
            other => Err(format!("unknown artifact type: {}", other)),
        }
    }
}

/// Artifact metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub title: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub libraries: Vec<String>,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: u32,
    pub archived: bool,
}

/// One entry of the append-only history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub version: u32,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangeType,
}

/// Kind of content mutation recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    /// Incremental edit
    #[default]
    Update,
    /// Full replacement, e.g. the model correcting earlier output
    Rewrite,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Rewrite => write!(f, "rewrite"),
        }
    }
}

/// Render lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Rendering,
    Ready,
    Error,
}

/// Transient render state of an artifact in one container
#[derive(Debug, Clone)]
pub struct RenderState {
    pub container_id: String,
    pub status: RenderStatus,
    pub error: Option<String>,
    pub handle: Option<RendererHandle>,
    /// Version of the content that was (being) rendered
    pub version: u32,
}

impl RenderState {
    pub(crate) fn rendering(container_id: &str, version: u32) -> Self {
        Self {
            container_id: container_id.to_string(),
            status: RenderStatus::Rendering,
            error: None,
            handle: None,
            version,
        }
    }
}

/// Caller-supplied metadata for a new artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataHints {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub libraries: Vec<String>,
    pub tags: Vec<String>,
}

impl MetadataHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the code language explicitly
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Declare a runtime library the artifact needs
    pub fn library(mut self, name: impl Into<String>) -> Self {
        self.libraries.push(name.into());
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_artifact_defaults() {
        let artifact = Artifact::new("a1", ArtifactType::Markdown, "# Hi", MetadataHints::new());

        assert_eq!(artifact.metadata.title, "Artifact a1");
        assert_eq!(artifact.metadata.version, 1);
        assert_eq!(artifact.history.len(), 1);
        assert_eq!(artifact.history[0].change_type, ChangeType::Create);
        assert!(!artifact.metadata.archived);
        assert!(artifact.render_states.is_empty());
    }

    #[test]
    fn test_hints_applied() {
        let hints = MetadataHints::new()
            .title("Chart")
            .description("Monthly sales")
            .library("chart.js")
            .tag("viz");
        let artifact = Artifact::new("a2", ArtifactType::Html, "<p>x</p>", hints);

        assert_eq!(artifact.metadata.title, "Chart");
        assert_eq!(artifact.metadata.description.as_deref(), Some("Monthly sales"));
        assert_eq!(artifact.metadata.libraries, vec!["chart.js"]);
        assert_eq!(artifact.metadata.tags, vec!["viz"]);
    }

    #[test]
    fn test_blank_title_falls_back() {
        let artifact = Artifact::new("a3", ArtifactType::Svg, "<svg/>", MetadataHints::new().title("  "));
        assert_eq!(artifact.metadata.title, "Artifact a3");
    }

    #[test]
    fn test_apply_revision_keeps_history_in_step() {
        let mut artifact = Artifact::new("a4", ArtifactType::Code, "v1", MetadataHints::new());

        assert_eq!(artifact.apply_revision("v2", ChangeType::Update).unwrap(), 2);
        assert_eq!(artifact.apply_revision("v3", ChangeType::Rewrite).unwrap(), 3);

        assert_eq!(artifact.content, "v3");
        assert_eq!(artifact.history.len() as u32, artifact.metadata.version);
        assert_eq!(artifact.version_content(1), Some("v1"));
        assert_eq!(artifact.history[2].change_type, ChangeType::Rewrite);
    }

    #[test]
    fn test_apply_revision_rejects_create() {
        let mut artifact = Artifact::new("a5", ArtifactType::Code, "v1", MetadataHints::new());
        let result = artifact.apply_revision("v2", ChangeType::Create);

        assert!(matches!(result, Err(Error::InvalidChangeType(_))));
        assert_eq!(artifact.metadata.version, 1);
        assert_eq!(artifact.content, "v1");
    }

    #[test]
    fn test_archive_is_idempotent() {
        let mut artifact = Artifact::new("a6", ArtifactType::Markdown, "x", MetadataHints::new());
        assert!(artifact.archive());
        assert!(!artifact.archive());
        assert!(artifact.metadata.archived);
    }

    #[test]
    fn test_artifact_type_parsing() {
        assert_eq!("html".parse::<ArtifactType>().unwrap(), ArtifactType::Html);
        assert_eq!(
            "image/svg+xml".parse::<ArtifactType>().unwrap(),
            ArtifactType::Svg
        );
        assert_eq!(
            "interactive-component".parse::<ArtifactType>().unwrap(),
            ArtifactType::InteractiveComponent
        );
        assert!("spreadsheet".parse::<ArtifactType>().is_err());
        for t in ArtifactType::ALL {
            assert_eq!(t.to_string().parse::<ArtifactType>().unwrap(), t);
            assert_eq!(t.mime().parse::<ArtifactType>().unwrap(), t);
        }
    }

    #[test]
    fn test_artifact_serialization_skips_render_state() {
        let mut artifact = Artifact::new("a7", ArtifactType::Html, "<p>x</p>", MetadataHints::new());
        artifact
            .render_states
            .insert("c1".to_string(), RenderState::rendering("c1", 1));

        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"type\":\"html\""));
        assert!(json.contains("\"lastModified\""));
        assert!(json.contains("\"changeType\":\"create\""));
        assert!(!json.contains("renderStates"));
    }
}
