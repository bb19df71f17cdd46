//! Renderer registry and renderers
//!
//! Each artifact type has exactly one renderer, and each renderer owns the
//! isolation policy for its type:
//!
//! ```text
//! html                  -> sandboxed embedded document (scripts, no same-origin)
//! interactive-component -> sandboxed document + curated capabilities
//! svg                   -> static wrapper, scripts already stripped
//! code                  -> escaped, highlighted, never executed
//! markdown              -> escaped static markup, never executed
//! ```
//!
//! Renderers mount through `Container::replace`, so rendering twice into the
//! same container, even concurrently, leaves a single child.

pub mod code;
pub mod component;
pub mod container;
pub mod html;
pub mod markdown;
pub mod svg;

pub use code::CodeRenderer;
pub use component::ComponentRenderer;
pub use container::{Container, Element};
pub use html::{HtmlRenderer, SandboxPolicy};
pub use markdown::MarkdownRenderer;
pub use svg::SvgRenderer;

use crate::artifact::ArtifactType;
use crate::config::{LibraryDefinition, RenderConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-call render inputs
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Libraries to inject, dependencies first
    pub libraries: Vec<LibraryDefinition>,
    /// Source language for code artifacts
    pub language: Option<String>,
}

/// What a renderer mounted, per renderer kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RendererHandle {
    /// Sandboxed embedded document
    Frame { sandbox: String, document_bytes: usize },
    /// Component document with its granted capabilities
    Component {
        sandbox: String,
        document_bytes: usize,
        capabilities: Vec<String>,
    },
    /// Static SVG wrapper
    Svg { view_box: Option<String> },
    /// Highlighted code view
    Code { language: String, lines: usize },
    /// Static markdown view
    Markdown { blocks: usize, headings: usize },
}

/// A type-specific renderer.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Clear `container` and mount `content` under this renderer's isolation policy.
    async fn render(
        &self,
        content: &str,
        container: &Container,
        options: &RenderOptions,
    ) -> Result<RendererHandle>;

    /// Catalog names of the libraries this renderer always needs
    fn required_libraries(&self) -> &'static [&'static str] {
        &[]
    }

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// Map from artifact type to renderer
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<ArtifactType, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in renderer for every type
    pub fn with_defaults(config: &RenderConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(ArtifactType::Html, Arc::new(HtmlRenderer::new(config)?));
        registry.register(
            ArtifactType::InteractiveComponent,
            Arc::new(ComponentRenderer::new(config)?),
        );
        registry.register(ArtifactType::Svg, Arc::new(SvgRenderer::new()?));
        registry.register(ArtifactType::Code, Arc::new(CodeRenderer::new()));
        registry.register(ArtifactType::Markdown, Arc::new(MarkdownRenderer::new()?));
        Ok(registry)
    }

    /// Register (or replace) the renderer for a type
    pub fn register(&mut self, artifact_type: ArtifactType, renderer: Arc<dyn Renderer>) {
        tracing::debug!(artifact_type = %artifact_type, renderer = renderer.name(), "Registered renderer");
        self.renderers.insert(artifact_type, renderer);
    }

    /// Renderer for a type
    pub fn get(&self, artifact_type: ArtifactType) -> Result<Arc<dyn Renderer>> {
        self.renderers
            .get(&artifact_type)
            .cloned()
            .ok_or_else(|| Error::RendererNotAvailable(artifact_type.to_string()))
    }

    /// Types with a registered renderer
    pub fn types(&self) -> Vec<ArtifactType> {
        let mut types: Vec<ArtifactType> = self.renderers.keys().copied().collect();
        types.sort();
        types
    }
}

/// Escape text for use in element content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for use inside a quoted attribute value
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
