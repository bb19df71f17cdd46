//! Artifact lifecycle events
//!
//! Events are broadcast to every subscriber. Payloads carry a snapshot of
//! the artifact at emission time (render state excluded), except `Archived`,
//! which only names the artifact.

use crate::artifact::{Artifact, ChangeType, RenderStatus};
use crate::render::RendererHandle;
use serde::Serialize;

/// Lifecycle event emitted by the artifact manager
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArtifactEvent {
    /// A new artifact entered the store
    Created { artifact: Artifact },
    /// An artifact received a new revision
    #[serde(rename_all = "camelCase")]
    Updated {
        artifact: Artifact,
        change_type: ChangeType,
    },
    /// A render attempt finished, successfully or not
    #[serde(rename_all = "camelCase")]
    Rendered {
        artifact: Artifact,
        container_id: String,
        version: u32,
        status: RenderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<RendererHandle>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// An artifact was archived
    #[serde(rename_all = "camelCase")]
    Archived { artifact_id: String },
}

impl ArtifactEvent {
    /// Kind of this event
    pub fn kind(&self) -> ArtifactEventKind {
        match self {
            Self::Created { .. } => ArtifactEventKind::Created,
            Self::Updated { .. } => ArtifactEventKind::Updated,
            Self::Rendered { .. } => ArtifactEventKind::Rendered,
            Self::Archived { .. } => ArtifactEventKind::Archived,
        }
    }

    /// Id of the affected artifact
    pub fn artifact_id(&self) -> &str {
        match self {
            Self::Created { artifact }
            | Self::Updated { artifact, .. }
            | Self::Rendered { artifact, .. } => &artifact.id,
            Self::Archived { artifact_id } => artifact_id,
        }
    }

    /// Artifact snapshot, absent for archive events
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Created { artifact }
            | Self::Updated { artifact, .. }
            | Self::Rendered { artifact, .. } => Some(artifact),
            Self::Archived { .. } => None,
        }
    }
}

/// Event name used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEventKind {
    Created,
    Updated,
    Rendered,
    Archived,
}

impl std::fmt::Display for ArtifactEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Rendered => write!(f, "rendered"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ArtifactEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "rendered" => Ok(Self::Rendered),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown artifact event: {}", other)),
        }
    }
}
