//! Artifact pipeline configuration management

use crate::error::{Error, Result};
use crate::sanitizer::RiskCategory;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main artifact pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Content classifier configuration
    pub classifier: ClassifierConfig,

    /// Content sanitizer configuration
    pub sanitizer: SanitizerConfig,

    /// Renderer configuration
    pub render: RenderConfig,

    /// Library loader configuration
    pub libraries: LibraryConfig,

    /// Artifact manager configuration
    pub manager: ManagerConfig,
}

impl ArtifactConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.classifier.threshold == 0 {
            return Err(Error::Config(
                "classifier.threshold must be at least 1".to_string(),
            ));
        }

        for token in &self.render.sandbox_tokens {
            if FORBIDDEN_SANDBOX_TOKENS.contains(&token.as_str()) {
                return Err(Error::Config(format!(
                    "sandbox token '{}' would break document isolation",
                    token
                )));
            }
        }

        if self.render.max_document_bytes == 0 {
            return Err(Error::Config(
                "render.max_document_bytes must be positive".to_string(),
            ));
        }

        if self.manager.event_capacity == 0 {
            return Err(Error::Config(
                "manager.event_capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Sandbox tokens that would let embedded content reach the host page.
pub const FORBIDDEN_SANDBOX_TOKENS: &[&str] = &[
    "allow-same-origin",
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
    "allow-top-navigation-to-custom-protocols",
    "allow-popups-to-escape-sandbox",
];

/// Classifier scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum score for content to become an artifact
    pub threshold: u32,

    /// Line count above which content counts as long
    pub long_content_lines: usize,

    /// Character count above which content counts as long
    pub long_content_chars: usize,

    /// Per-signal weights
    pub weights: SignalWeights,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: 4,
            long_content_lines: 15,
            long_content_chars: 800,
            weights: SignalWeights::default(),
        }
    }
}

/// Weight contributed by each triggered classifier signal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub long_content: u32,
    pub interactive: u32,
    pub visual: u32,
    pub code: u32,
    pub build_intent: u32,
    pub iterative: u32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            long_content: 3,
            interactive: 4,
            visual: 3,
            code: 2,
            build_intent: 2,
            iterative: 1,
        }
    }
}

/// Sanitizer policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Elements removed (with their content) from markup
    pub dangerous_elements: Vec<String>,

    /// Remove `on*=` event handler attributes from markup
    pub strip_event_handlers: bool,

    /// Neutralize `javascript:` URLs in href/src/action attributes
    pub strip_javascript_urls: bool,

    /// Constructs that cause interactive components to be rejected
    pub forbidden_patterns: Vec<ForbiddenPattern>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            dangerous_elements: [
                "script", "object", "embed", "applet", "iframe", "frame", "base", "form",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            strip_event_handlers: true,
            strip_javascript_urls: true,
            forbidden_patterns: default_forbidden_patterns(),
        }
    }
}

/// A forbidden construct in executable component code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForbiddenPattern {
    /// Rule name
    pub name: String,

    /// Regex pattern
    pub pattern: String,

    /// Risk category reported on rejection
    pub category: RiskCategory,
}

/// Default forbidden constructs for interactive components
pub fn default_forbidden_patterns() -> Vec<ForbiddenPattern> {
    let rule = |name: &str, pattern: &str, category: RiskCategory| ForbiddenPattern {
        name: name.to_string(),
        pattern: pattern.to_string(),
        category,
    };

    vec![
        rule("eval", r"\beval\s*\(", RiskCategory::DynamicEvaluation),
        rule(
            "function_constructor",
            r"\bFunction\s*\(",
            RiskCategory::DynamicEvaluation,
        ),
        rule(
            "string_timer",
            r#"\bset(?:Timeout|Interval)\s*\(\s*["'`]"#,
            RiskCategory::DynamicEvaluation,
        ),
        rule(
            "dynamic_import",
            r"\bimport\s*\(",
            RiskCategory::DynamicEvaluation,
        ),
        rule(
            "document_write",
            r"\bdocument\s*\.\s*write(?:ln)?\b",
            RiskCategory::DocumentWrite,
        ),
        rule(
            "top_location",
            r"\b(?:window|top|parent|self)\s*\.\s*location\b",
            RiskCategory::TopLevelNavigation,
        ),
        rule(
            "location_assign",
            r"(?:^|[^.\w])location\s*\.\s*(?:href\s*=[^=]|assign\s*\(|replace\s*\()",
            RiskCategory::TopLevelNavigation,
        ),
        rule(
            "window_open",
            r"\bwindow\s*\.\s*open\s*\(",
            RiskCategory::TopLevelNavigation,
        ),
        rule("fetch", r"\bfetch\s*\(", RiskCategory::NetworkAccess),
        rule("xhr", r"\bXMLHttpRequest\b", RiskCategory::NetworkAccess),
        rule("websocket", r"\bWebSocket\s*\(", RiskCategory::NetworkAccess),
        rule("event_source", r"\bEventSource\s*\(", RiskCategory::NetworkAccess),
        rule("beacon", r"\bsendBeacon\s*\(", RiskCategory::NetworkAccess),
    ]
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sandbox tokens applied to embedded documents
    pub sandbox_tokens: Vec<String>,

    /// Minimum embedded document height in pixels
    pub min_height_px: u32,

    /// Upper bound on a generated embedded document
    pub max_document_bytes: usize,

    /// Title used for wrapped markup fragments
    pub document_title: String,

    /// Module specifiers a component may import
    pub component_modules: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sandbox_tokens: vec!["allow-scripts".to_string()],
            min_height_px: 400,
            max_document_bytes: 2 * 1024 * 1024,
            document_title: "Artifact".to_string(),
            component_modules: vec![
                "react".to_string(),
                "react-dom".to_string(),
                "react-dom/client".to_string(),
            ],
        }
    }
}

/// Library loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// HTTP fetch timeout in seconds
    pub timeout_secs: u64,

    /// Static library catalog
    pub catalog: Vec<LibraryDefinition>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            catalog: default_library_catalog(),
        }
    }
}

/// How a library is injected into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    /// `<script src>`
    #[default]
    Js,
    /// `<link rel="stylesheet">`
    Css,
}

/// A runtime library available to renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDefinition {
    /// Catalog name
    pub name: String,

    /// Library version
    pub version: String,

    /// Source URL
    pub url: String,

    /// Injection kind
    #[serde(default)]
    pub kind: LibraryKind,

    /// Names of libraries that must load first
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Built-in library catalog
pub fn default_library_catalog() -> Vec<LibraryDefinition> {
    let lib = |name: &str, version: &str, url: &str, kind: LibraryKind, deps: &[&str]| {
        LibraryDefinition {
            name: name.to_string(),
            version: version.to_string(),
            url: url.to_string(),
            kind,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    };

    vec![
        lib(
            "react",
            "18.2.0",
            "https://unpkg.com/react@18.2.0/umd/react.production.min.js",
            LibraryKind::Js,
            &[],
        ),
        lib(
            "react-dom",
            "18.2.0",
            "https://unpkg.com/react-dom@18.2.0/umd/react-dom.production.min.js",
            LibraryKind::Js,
            &["react"],
        ),
        lib(
            "babel",
            "7.23.6",
            "https://unpkg.com/@babel/standalone@7.23.6/babel.min.js",
            LibraryKind::Js,
            &[],
        ),
        lib(
            "tailwindcss",
            "3.4.0",
            "https://cdn.tailwindcss.com",
            LibraryKind::Js,
            &[],
        ),
        lib(
            "bootstrap",
            "5.3.0",
            "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
            LibraryKind::Css,
            &[],
        ),
        lib(
            "lodash",
            "4.17.21",
            "https://cdn.jsdelivr.net/npm/lodash@4.17.21/lodash.min.js",
            LibraryKind::Js,
            &[],
        ),
        lib(
            "chart.js",
            "4.4.0",
            "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js",
            LibraryKind::Js,
            &[],
        ),
        lib(
            "d3",
            "7.8.5",
            "https://d3js.org/d3.v7.min.js",
            LibraryKind::Js,
            &[],
        ),
        lib(
            "three",
            "0.158.0",
            "https://cdn.jsdelivr.net/npm/three@0.158.0/build/three.min.js",
            LibraryKind::Js,
            &[],
        ),
    ]
}

/// Artifact manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Await the re-render triggered by an update instead of detaching it
    pub await_rerender: bool,

    /// Detect the language of code artifacts created without one
    pub auto_detect_language: bool,

    /// Buffered events per subscriber before lagging ones drop events
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            await_rerender: false,
            auto_detect_language: true,
            event_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ArtifactConfig::default();
        assert_eq!(config.classifier.threshold, 4);
        assert_eq!(config.render.sandbox_tokens, vec!["allow-scripts"]);
        assert!(!config.manager.await_rerender);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_catalog() {
        let catalog = default_library_catalog();
        let react_dom = catalog.iter().find(|l| l.name == "react-dom").unwrap();
        assert_eq!(react_dom.dependencies, vec!["react"]);
        let bootstrap = catalog.iter().find(|l| l.name == "bootstrap").unwrap();
        assert_eq!(bootstrap.kind, LibraryKind::Css);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ArtifactConfig::from_toml(
            r#"
            [classifier]
            threshold = 6

            [manager]
            await_rerender = true
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.threshold, 6);
        assert_eq!(config.classifier.long_content_lines, 15);
        assert!(config.manager.await_rerender);
        assert!(!config.libraries.catalog.is_empty());
    }

    #[test]
    fn test_same_origin_token_rejected() {
        let result = ArtifactConfig::from_toml(
            r#"
            [render]
            sandbox_tokens = ["allow-scripts", "allow-same-origin"]
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = ArtifactConfig::default();
        config.classifier.threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[libraries.catalog]]
            name = "mermaid"
            version = "10.6.1"
            url = "https://cdn.jsdelivr.net/npm/mermaid@10.6.1/dist/mermaid.min.js"
            "#
        )
        .unwrap();

        let config = ArtifactConfig::from_file(file.path()).unwrap();
        assert_eq!(config.libraries.catalog.len(), 1);
        assert_eq!(config.libraries.catalog[0].kind, LibraryKind::Js);
        assert!(config.libraries.catalog[0].dependencies.is_empty());
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ArtifactConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = ArtifactConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.libraries.catalog, config.libraries.catalog);
    }
}
