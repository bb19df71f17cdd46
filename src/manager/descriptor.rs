//! Extracted artifact descriptors
//!
//! The stream collaborator hands over `{ id, type, title, content }` tuples.
//! The `type` field is free text written by the model, so it goes through an
//! alias table before falling back to content detection.

use crate::artifact::ArtifactType;
use crate::render::code::normalize_language;
use serde::{Deserialize, Serialize};

/// Language names accepted directly as a descriptor type
const CODE_LANGUAGES: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "rust",
    "go",
    "java",
    "cpp",
    "php",
    "ruby",
    "sql",
    "bash",
    "css",
    "json",
    "yaml",
    "swift",
    "kotlin",
];

/// Artifact tuple extracted from assistant output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactDescriptor {
    /// Artifact id; empty means "generate one"
    pub id: String,
    /// Type name, alias, language or MIME name
    #[serde(rename = "type")]
    pub type_name: String,
    pub title: String,
    pub content: String,
}

impl ArtifactDescriptor {
    pub fn new(
        id: impl Into<String>,
        type_name: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Artifact type (and code language) named by the descriptor, if the
    /// type field is recognized.
    pub fn resolve_type(&self) -> Option<(ArtifactType, Option<String>)> {
        resolve_type_name(&self.type_name)
    }
}

/// Map a free-form type name onto an artifact type.
pub fn resolve_type_name(type_name: &str) -> Option<(ArtifactType, Option<String>)> {
    let name = type_name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }

    let resolved = match name.as_str() {
        "html" | "htm" | "webpage" => ArtifactType::Html,
        "react" | "jsx" | "tsx" | "component" | "interactive" => ArtifactType::InteractiveComponent,
        "svg" => ArtifactType::Svg,
        "markdown" | "md" => ArtifactType::Markdown,
        "code" => ArtifactType::Code,
        other => {
            if let Ok(t) = other.parse::<ArtifactType>() {
                return Some((t, None));
            }
            let language = normalize_language(other);
            if CODE_LANGUAGES.contains(&language.as_str()) {
                return Some((ArtifactType::Code, Some(language)));
            }
            return None;
        }
    };
    Some((resolved, None))
}
