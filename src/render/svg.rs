//! SVG renderer
//!
//! Mounts already-sanitized SVG markup in a wrapper element. Script elements
//! were removed at sanitization time; this renderer only checks that the
//! content really is an SVG document.

use super::container::{Container, Element};
use super::{RenderOptions, Renderer, RendererHandle};
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;

const SVG_ROOT: &str = r"(?is)^\s*(?:<\?xml[^>]*\?>\s*)?(?:<!--.*?-->\s*|<!DOCTYPE[^>]*>\s*)*<svg[\s>/]";
const VIEW_BOX: &str = r#"(?i)<svg\b[^>]*\bviewBox\s*=\s*["']([^"']*)["']"#;

/// Renderer for `svg` artifacts
#[derive(Debug)]
pub struct SvgRenderer {
    root: Regex,
    view_box: Regex,
}

impl SvgRenderer {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Config(format!("Invalid SVG pattern: {}", e)))
        };
        Ok(Self {
            root: compile(SVG_ROOT)?,
            view_box: compile(VIEW_BOX)?,
        })
    }
}

#[async_trait]
impl Renderer for SvgRenderer {
    async fn render(
        &self,
        content: &str,
        container: &Container,
        _options: &RenderOptions,
    ) -> Result<RendererHandle> {
        if !self.root.is_match(content) {
            container.clear().await;
            return Err(Error::RenderFailed(
                "content has no <svg> root element".to_string(),
            ));
        }

        let view_box = self
            .view_box
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        container
            .replace(
                Element::new("div")
                    .attr("class", "artifact-svg")
                    .attr("role", "img")
                    .inner_html(content.trim()),
            )
            .await;

        Ok(RendererHandle::Svg { view_box })
    }

    fn name(&self) -> &str {
        "svg"
    }
}
