//! HTML renderer
//!
//! Markup runs inside an embedded document carrying a `sandbox` attribute.
//! The token set comes from configuration but can never grant same-origin
//! access or top-level navigation, so scripts in the document cannot reach
//! the host page, its storage or its cookies.

use super::container::{Container, Element};
use super::{escape_html, RenderOptions, Renderer, RendererHandle};
use crate::config::{LibraryDefinition, RenderConfig, FORBIDDEN_SANDBOX_TOKENS};
use crate::error::{Error, Result};
use crate::library::library_tag;
use async_trait::async_trait;

/// Sandbox attributes and limits for embedded documents
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    tokens: Vec<String>,
    min_height_px: u32,
    max_document_bytes: usize,
}

impl SandboxPolicy {
    /// Build a policy from configuration, rejecting isolation-breaking tokens.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let mut tokens: Vec<String> = Vec::new();
        for token in &config.sandbox_tokens {
            let token = token.trim().to_ascii_lowercase();
            if FORBIDDEN_SANDBOX_TOKENS.contains(&token.as_str()) {
                return Err(Error::Config(format!(
                    "sandbox token '{}' would break document isolation",
                    token
                )));
            }
            if !token.is_empty() && !tokens.contains(&token) {
                tokens.push(token);
            }
        }

        Ok(Self {
            tokens,
            min_height_px: config.min_height_px,
            max_document_bytes: config.max_document_bytes,
        })
    }

    /// Same policy with an extra token
    pub fn with_token(mut self, token: &str) -> Result<Self> {
        if FORBIDDEN_SANDBOX_TOKENS.contains(&token) {
            return Err(Error::Config(format!(
                "sandbox token '{}' would break document isolation",
                token
            )));
        }
        if !self.tokens.iter().any(|t| t == token) {
            self.tokens.push(token.to_string());
        }
        Ok(self)
    }

    /// Value of the `sandbox` attribute
    pub fn sandbox_attr(&self) -> String {
        self.tokens.join(" ")
    }

    /// Wrap a complete document in a sandboxed frame element.
    pub(crate) fn frame(&self, document: &str, title: &str) -> Result<Element> {
        if document.len() > self.max_document_bytes {
            return Err(Error::RenderFailed(format!(
                "document is {} bytes, limit is {}",
                document.len(),
                self.max_document_bytes
            )));
        }

        Ok(Element::new("iframe")
            .attr("sandbox", self.sandbox_attr())
            .attr("srcdoc", document)
            .attr("title", title)
            .attr("referrerpolicy", "no-referrer")
            .attr(
                "style",
                format!("width:100%;border:0;min-height:{}px", self.min_height_px),
            ))
    }
}

/// Markup to inject for a set of libraries, one tag per line
pub(crate) fn library_tags(libraries: &[LibraryDefinition]) -> String {
    libraries
        .iter()
        .map(|lib| library_tag(&lib.url, lib.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renderer for `html` artifacts
#[derive(Debug)]
pub struct HtmlRenderer {
    policy: SandboxPolicy,
    title: String,
}

impl HtmlRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            policy: SandboxPolicy::from_config(config)?,
            title: config.document_title.clone(),
        })
    }

    /// Produce the full document: complete documents get the library tags
    /// injected into their head, fragments are wrapped in a default shell.
    pub fn build_document(&self, content: &str, libraries: &[LibraryDefinition]) -> String {
        let tags = library_tags(libraries);
        let lower = content.to_ascii_lowercase();
        let is_document = lower.contains("<!doctype") || lower.contains("<html");

        if !is_document {
            return format!(
                "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
                 <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
                 <title>{}</title>\n{}\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>",
                escape_html(&self.title),
                tags,
                SHELL_STYLE,
                content
            );
        }

        if tags.is_empty() {
            return content.to_string();
        }

        // Indices into `lower` are valid for `content`: ASCII lowercasing
        // preserves byte offsets.
        if let Some(at) = find_open_tag_end(&lower, "<head") {
            return format!("{}\n{}{}", &content[..at], tags, &content[at..]);
        }
        if let Some(at) = find_open_tag_end(&lower, "<html") {
            return format!("{}<head>\n{}\n</head>{}", &content[..at], tags, &content[at..]);
        }
        format!("{}\n{}", tags, content)
    }
}

const SHELL_STYLE: &str = "body{margin:0;padding:20px;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#f8fafc}";

/// Byte offset just past the `>` of the first `tag` opening tag
fn find_open_tag_end(lower: &str, tag: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = lower[from..].find(tag) {
        let start = from + pos;
        let after = start + tag.len();
        match lower.as_bytes().get(after) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                return lower[after..].find('>').map(|end| after + end + 1);
            }
            _ => from = after,
        }
    }
    None
}

#[async_trait]
impl Renderer for HtmlRenderer {
    async fn render(
        &self,
        content: &str,
        container: &Container,
        options: &RenderOptions,
    ) -> Result<RendererHandle> {
        let document = self.build_document(content, &options.libraries);
        let frame = match self.policy.frame(&document, &self.title) {
            Ok(frame) => frame,
            Err(e) => {
                container.clear().await;
                return Err(e);
            }
        };
        container.replace(frame).await;

        Ok(RendererHandle::Frame {
            sandbox: self.policy.sandbox_attr(),
            document_bytes: document.len(),
        })
    }

    fn name(&self) -> &str {
        "html"
    }
}
