//! Artifact pipeline error types

use crate::sanitizer::RiskCategory;
use thiserror::Error;

/// Artifact pipeline error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid rule, catalog cycle, forbidden sandbox token)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content rejected by the sanitizer; it never reaches the store
    #[error("Sanitization rejected: {category} pattern `{pattern}`")]
    SanitizationRejected {
        /// Risk category of the forbidden construct
        category: RiskCategory,
        /// The pattern that matched
        pattern: String,
    },

    /// No renderer registered for the artifact type
    #[error("No renderer available for type {0}")]
    RendererNotAvailable(String),

    /// Renderer failed; captured into the artifact's render state
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// A runtime library could not be loaded
    #[error("Library {name} failed to load: {reason}")]
    LibraryLoadFailed {
        /// Library name from the catalog
        name: String,
        /// Human-readable reason
        reason: String,
    },

    /// Unknown artifact id
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// An artifact with this id already exists
    #[error("Artifact already exists: {0}")]
    DuplicateId(String),

    /// `create` is reserved for the first history entry
    #[error("Invalid change type for update: {0}")]
    InvalidChangeType(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error came from a render attempt (and is retryable).
    pub fn is_render_failure(&self) -> bool {
        matches!(
            self,
            Self::RenderFailed(_) | Self::LibraryLoadFailed { .. }
        )
    }
}

/// Result type alias for artifact pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
