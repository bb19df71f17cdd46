//! Content sanitizer
//!
//! Policy gate between raw model output and the artifact store. Markup types
//! are stripped and continue; executable component code is scanned and
//! rejected outright on any forbidden construct. Display-only types pass
//! through unchanged because their renderers never execute them.
//!
//! ```text
//! html                  -> strip elements, handlers, javascript: URLs
//! svg                   -> strip <script> only
//! interactive-component -> scan, reject on match
//! code, markdown        -> pass through
//! ```

pub mod markup;
pub mod script;

pub use markup::{MarkupStripper, StripReport};
pub use script::{ScriptScanner, ScriptViolation};

use crate::artifact::ArtifactType;
use crate::config::SanitizerConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Risk category of a forbidden construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// `eval`, `Function`, string timers, dynamic `import()`
    DynamicEvaluation,
    /// `document.write`
    DocumentWrite,
    /// Navigating the top-level or opener window
    TopLevelNavigation,
    /// Network requests not mediated by the host
    NetworkAccess,
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DynamicEvaluation => write!(f, "dynamic_evaluation"),
            Self::DocumentWrite => write!(f, "document_write"),
            Self::TopLevelNavigation => write!(f, "top_level_navigation"),
            Self::NetworkAccess => write!(f, "network_access"),
        }
    }
}

/// Per-type content sanitizer
#[derive(Debug)]
pub struct ContentSanitizer {
    html: MarkupStripper,
    svg: MarkupStripper,
    scanner: ScriptScanner,
}

impl ContentSanitizer {
    /// Compile the configured policy.
    pub fn new(config: &SanitizerConfig) -> Result<Self> {
        Ok(Self {
            html: MarkupStripper::new(
                &config.dangerous_elements,
                config.strip_event_handlers,
                config.strip_javascript_urls,
            )?,
            svg: MarkupStripper::scripts_only()?,
            scanner: ScriptScanner::new(&config.forbidden_patterns)?,
        })
    }

    /// Sanitize content of the given type.
    ///
    /// Returns the content to store, or `SanitizationRejected` for component
    /// code containing a forbidden construct.
    pub fn sanitize(&self, content: &str, artifact_type: ArtifactType) -> Result<String> {
        match artifact_type {
            ArtifactType::Html => Ok(self.strip_with(&self.html, content, artifact_type)),
            ArtifactType::Svg => Ok(self.strip_with(&self.svg, content, artifact_type)),
            ArtifactType::InteractiveComponent => {
                if let Err(e) = self.scanner.check(content) {
                    tracing::warn!(error = %e, "Rejected interactive component");
                    return Err(e);
                }
                Ok(content.to_string())
            }
            ArtifactType::Code | ArtifactType::Markdown => Ok(content.to_string()),
        }
    }

    /// Violations in component code without rejecting
    pub fn scan_component(&self, content: &str) -> Vec<ScriptViolation> {
        self.scanner.scan(content)
    }

    fn strip_with(
        &self,
        stripper: &MarkupStripper,
        content: &str,
        artifact_type: ArtifactType,
    ) -> String {
        let (sanitized, report) = stripper.strip(content);
        if !report.is_clean() {
            tracing::warn!(
                artifact_type = %artifact_type,
                elements = report.elements,
                attributes = report.attributes,
                urls = report.urls,
                passes = report.passes,
                "Stripped active content"
            );
        }
        sanitized
    }
}
