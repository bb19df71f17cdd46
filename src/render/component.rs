//! Interactive component renderer
//!
//! Component source never runs in the host scope. It is embedded as a JSON
//! string in a sandboxed document whose bootstrap transforms it with Babel
//! and evaluates it with an explicit parameter list: the module shim plus
//! the named capabilities below. Anything else the component references
//! resolves against the sandboxed document's own globals.
//!
//! Before building the document the source is checked statically: every
//! import specifier must be in the curated module set, and the component
//! must have a default export.

use super::container::{Container, Element};
use super::html::{library_tags, SandboxPolicy};
use super::{escape_html, RenderOptions, Renderer, RendererHandle};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;

/// Names passed into component scope
pub const CAPABILITIES: &[&str] = &[
    "React",
    "useState",
    "useEffect",
    "useRef",
    "useMemo",
    "useCallback",
    "render",
];

const IMPORT_SPECIFIER: &str =
    r#"(?m)^\s*(?:import\s+(?:[\w*${}\s,]+?\s+from\s+)?|export\s+[\w*${}\s,]+?\s+from\s+)["']([^"']+)["']"#;
const REQUIRE_SPECIFIER: &str = r#"\brequire\s*\(\s*["']([^"']+)["']\s*\)"#;
const DEFAULT_EXPORT: &str = r"\bexport\s+default\b|\bmodule\.exports\s*=";

/// Renderer for `interactive-component` artifacts
#[derive(Debug)]
pub struct ComponentRenderer {
    policy: SandboxPolicy,
    title: String,
    modules: Vec<String>,
    imports: Regex,
    requires: Regex,
    default_export: Regex,
}

impl ComponentRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::Config(format!("Invalid component pattern: {}", e)))
        };

        Ok(Self {
            policy: SandboxPolicy::from_config(config)?.with_token("allow-scripts")?,
            title: config.document_title.clone(),
            modules: config.component_modules.clone(),
            imports: compile(IMPORT_SPECIFIER)?,
            requires: compile(REQUIRE_SPECIFIER)?,
            default_export: compile(DEFAULT_EXPORT)?,
        })
    }

    /// Static checks run before any document is built.
    pub fn check(&self, source: &str) -> Result<()> {
        let specifiers = self
            .imports
            .captures_iter(source)
            .chain(self.requires.captures_iter(source))
            .filter_map(|c| c.get(1).map(|m| m.as_str()));

        for specifier in specifiers {
            if !self.modules.iter().any(|m| m == specifier) {
                return Err(Error::RenderFailed(format!(
                    "module '{}' is not available to components (allowed: {})",
                    specifier,
                    self.modules.join(", ")
                )));
            }
        }

        if !self.default_export.is_match(source) {
            return Err(Error::RenderFailed(
                "component has no default export".to_string(),
            ));
        }

        Ok(())
    }

    /// Full sandboxed document for a component.
    pub fn build_document(&self, source: &str, options: &RenderOptions) -> Result<String> {
        let source_literal = script_literal(source)?;
        let modules = self
            .modules
            .iter()
            .map(|m| Ok(format!("{}: {}", script_literal(m)?, module_global(m)?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let capabilities = script_literal(CAPABILITIES)?;

        // Source last so its text is never scanned for placeholders
        let bootstrap = BOOTSTRAP
            .replace("__MODULES__", &modules)
            .replace("__CAPABILITIES__", &capabilities)
            .replace("__SOURCE__", &source_literal);

        Ok(format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
             <title>{}</title>\n{}\n<style>{}</style>\n</head>\n<body>\n\
             <div id=\"root\"></div>\n<script>\n{}\n</script>\n</body>\n</html>",
            escape_html(&self.title),
            library_tags(&options.libraries),
            COMPONENT_STYLE,
            bootstrap
        ))
    }
}

/// JSON literal safe to embed inside a `<script>` element
fn script_literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?
        .replace("</", "<\\/")
        .replace("<!--", "<\\!--"))
}

/// Expression for the global a curated module resolves to
fn module_global(specifier: &str) -> Result<String> {
    Ok(match specifier {
        "react" => "React".to_string(),
        s if s.starts_with("react-dom") => "ReactDOM".to_string(),
        s => format!("window[{}]", script_literal(s)?),
    })
}

const COMPONENT_STYLE: &str = "body{margin:0;padding:16px;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif}\
.artifact-error{padding:16px;background:#fef2f2;border:1px solid #fecaca;border-radius:8px;color:#991b1b}\
.artifact-error pre{white-space:pre-wrap;font-size:13px}";

const BOOTSTRAP: &str = r#"(function () {
  var rootNode = document.getElementById('root');
  function fail(err) {
    var panel = document.createElement('div');
    panel.className = 'artifact-error';
    var heading = document.createElement('strong');
    heading.textContent = 'Component error';
    var detail = document.createElement('pre');
    detail.textContent = String((err && err.message) || err);
    panel.appendChild(heading);
    panel.appendChild(detail);
    rootNode.replaceChildren(panel);
  }
  window.addEventListener('error', function (e) { fail(e.error || e.message); });
  try {
    var source = __SOURCE__;
    var modules = { __MODULES__ };
    var root = null;
    var scope = {
      React: React,
      useState: React.useState,
      useEffect: React.useEffect,
      useRef: React.useRef,
      useMemo: React.useMemo,
      useCallback: React.useCallback,
      render: function (element) {
        root = root || ReactDOM.createRoot(rootNode);
        root.render(element);
      }
    };
    var names = __CAPABILITIES__;
    var compiled = Babel.transform(source, {
      presets: ['react', 'env'],
      plugins: ['transform-modules-commonjs']
    }).code;
    var module = { exports: {} };
    var require = function (name) {
      if (Object.prototype.hasOwnProperty.call(modules, name)) { return modules[name]; }
      throw new Error('Module ' + name + ' is not available');
    };
    var factory = Function.apply(null, ['module', 'exports', 'require'].concat(names, [compiled]));
    factory.apply(null, [module, module.exports, require].concat(names.map(function (n) { return scope[n]; })));
    var Component = module.exports.default || module.exports;
    if (typeof Component !== 'function') {
      throw new Error('Default export is not a component function');
    }
    scope.render(React.createElement(Component));
  } catch (err) {
    fail(err);
  }
})();"#;

#[async_trait]
impl Renderer for ComponentRenderer {
    async fn render(
        &self,
        content: &str,
        container: &Container,
        options: &RenderOptions,
    ) -> Result<RendererHandle> {
        if let Err(e) = self.check(content) {
            container.replace(error_panel(&e.to_string())).await;
            return Err(e);
        }

        let frame = self
            .build_document(content, options)
            .and_then(|document| {
                let frame = self.policy.frame(&document, &self.title)?;
                Ok((frame, document.len()))
            });
        let (frame, document_bytes) = match frame {
            Ok(built) => built,
            Err(e) => {
                container.clear().await;
                return Err(e);
            }
        };
        container
            .replace(frame.attr("data-artifact-kind", "component"))
            .await;

        Ok(RendererHandle::Component {
            sandbox: self.policy.sandbox_attr(),
            document_bytes,
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn required_libraries(&self) -> &'static [&'static str] {
        &["react", "react-dom", "babel"]
    }

    fn name(&self) -> &str {
        "component"
    }
}

/// Inline panel mounted when a component fails its static checks
fn error_panel(message: &str) -> Element {
    Element::new("div")
        .attr("class", "artifact-error")
        .inner_html(format!(
            "<strong>Component error</strong><pre>{}</pre>",
            escape_html(message)
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = "import React, { useState } from 'react';\n\nexport default function Counter() {\n  const [n, setN] = useState(0);\n  return <button onClick={() => setN(n + 1)}>{n}</button>;\n}\n";

    fn renderer() -> ComponentRenderer {
        ComponentRenderer::new(&RenderConfig::default()).unwrap()
    }

    #[test]
    fn test_check_accepts_curated_imports() {
        let r = renderer();
        assert!(r.check(COUNTER).is_ok());
        assert!(r
            .check("import { createRoot } from \"react-dom/client\";\nexport default () => null;")
            .is_ok());
    }

    #[test]
    fn test_check_rejects_unknown_module() {
        let r = renderer();
        let err = r
            .check("import axios from 'axios';\nexport default function A() { return null; }")
            .unwrap_err();
        assert!(err.to_string().contains("axios"));

        let err = r
            .check("const fs = require('fs');\nexport default function A() { return null; }")
            .unwrap_err();
        assert!(err.to_string().contains("'fs'"));

        assert!(r
            .check("import './styles.css';\nexport default function A() { return null; }")
            .is_err());
    }

    #[test]
    fn test_check_requires_default_export() {
        let r = renderer();
        let result = r.check("function App() { return <div/>; }");
        assert!(matches!(result, Err(Error::RenderFailed(msg)) if msg.contains("default export")));
    }

    #[test]
    fn test_document_embeds_source_safely() {
        let r = renderer();
        let source = "export default function A() { return <p>{'</script><script>alert(1)'}</p>; }";
        let doc = r.build_document(source, &RenderOptions::default()).unwrap();

        // Only the bootstrap's own script element closes
        assert_eq!(doc.matches("</script>").count(), 1);
        assert!(doc.contains(r#""react": React"#));
        assert!(doc.contains(r#""react-dom/client": ReactDOM"#));
        assert!(doc.contains(r#"["React","useState","useEffect","useRef","useMemo","useCallback","render"]"#));
    }

    #[tokio::test]
    async fn test_render_mounts_scripts_only_sandbox() {
        let r = renderer();
        let container = Container::new("c1");
        let handle = r
            .render(COUNTER, &container, &RenderOptions::default())
            .await
            .unwrap();

        let children = container.children().await;
        assert_eq!(children.len(), 1);
        let sandbox = children[0].attribute("sandbox").unwrap();
        assert!(sandbox.contains("allow-scripts"));
        assert!(!sandbox.contains("allow-same-origin"));

        match handle {
            RendererHandle::Component { capabilities, .. } => {
                assert_eq!(capabilities.len(), CAPABILITIES.len())
            }
            other => panic!("unexpected handle: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_check_shows_error_panel() {
        let r = renderer();
        let container = Container::new("c1");
        let result = r
            .render("import x from 'lodash';", &container, &RenderOptions::default())
            .await;

        assert!(matches!(result, Err(Error::RenderFailed(_))));
        let children = container.children().await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].attribute("class"), Some("artifact-error"));
        assert!(children[0].inner_html.contains("lodash"));
    }

    #[test]
    fn test_policy_adds_allow_scripts() {
        let config = RenderConfig {
            sandbox_tokens: vec![],
            ..Default::default()
        };
        let r = ComponentRenderer::new(&config).unwrap();
        assert_eq!(r.policy.sandbox_attr(), "allow-scripts");
    }

    #[test]
    fn test_error_panel_escapes() {
        let panel = error_panel("<b>bad</b>");
        assert!(panel.inner_html.contains("&lt;b&gt;bad&lt;/b&gt;"));
    }
}
