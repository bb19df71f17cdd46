//! Content type and language detection
//!
//! Ordered pattern match against the content itself: HTML document markers,
//! component syntax, SVG, language-specific syntax in fixed priority,
//! markdown structure, then loose code markers (a brace pair or the
//! `function` keyword) read as JavaScript, then a markdown fallback flagged
//! as ambiguous.

use crate::artifact::ArtifactType;
use crate::error::{Error, Result};
use regex::Regex;

/// Result of type detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDetection {
    /// Detected artifact type
    pub artifact_type: ArtifactType,
    /// Detected language for `code` artifacts
    pub language: Option<String>,
    /// No pattern matched; the type is the markdown fallback
    pub ambiguous: bool,
}

/// Language patterns in priority order. More specific syntaxes come first so
/// that, e.g., TypeScript annotations win over the generic JavaScript rule.
const LANGUAGE_PATTERNS: &[(&str, &str)] = &[
    (
        "rust",
        r"\bfn\s+\w+\s*[<(]|\blet\s+mut\s|\buse\s+(?:std|crate)::|\bprintln!\s*\(|\bimpl(?:<[^>]*>)?\s+\w+",
    ),
    (
        "go",
        r"(?m)^\s*package\s+\w+\s*$|\bfunc\s+(?:\([^)]*\)\s*)?\w+\s*\(|\bfmt\.\w+\(",
    ),
    (
        "python",
        r"(?m)^\s*def\s+\w+\s*\(.*\)\s*(?:->\s*[^:]+)?:|^\s*from\s+[\w.]+\s+import\s|^\s*import\s+[\w.]+(?:\s+as\s+\w+)?\s*$|if\s+__name__\s*==|^\s*print\(",
    ),
    (
        "typescript",
        r"(?m)\binterface\s+\w+\s*(?:extends\s+[\w,\s]+)?\{|:\s*(?:string|number|boolean|void)\b|\benum\s+\w+\s*\{|^\s*(?:export\s+)?type\s+\w+\s*=",
    ),
    (
        "java",
        r"\bpublic\s+(?:static\s+)?(?:final\s+)?(?:class|void|interface)\b|System\.out\.print",
    ),
    (
        "cpp",
        r#"(?m)^\s*#include\s*[<"]|\busing\s+namespace\s+\w+|\bstd::\w+|\bcout\s*<<"#,
    ),
    ("php", r"<\?php"),
    (
        "javascript",
        r"\bfunction\s*\w*\s*\(|\b(?:const|let|var)\s+\w+\s*=|=>|\bconsole\.\w+\(|\bdocument\.\w+|\bwindow\.\w+",
    ),
    (
        "sql",
        r"(?im)^\s*(?:SELECT\s+[\s\S]+?\bFROM\b|INSERT\s+INTO\b|UPDATE\s+\w+\s+SET\b|DELETE\s+FROM\b|CREATE\s+(?:TABLE|INDEX|VIEW)\b)",
    ),
    (
        "bash",
        r"(?m)^#!/(?:usr/)?bin/(?:env\s+)?(?:ba|z)?sh|^\s*(?:echo|cd|mkdir|export|sudo|apt-get|chmod)\s+\S",
    ),
    (
        "css",
        r"@media\b|@keyframes\b|(?m)^\s*[.#:]?[A-Za-z*][^{}\n]*\{[^{}]*[\w-]+\s*:\s*[^{};]+;?[^{}]*\}",
    ),
    ("html", r"</[a-zA-Z][\w-]*\s*>"),
];

const HTML_DOCUMENT: &str = r"(?i)<!DOCTYPE\s+html|<html[\s>]|<head[\s>]|<body[\s>]";

const COMPONENT: &str = r#"\bimport\s+React\b|\bfrom\s+['"]react['"]|\bexport\s+default\b|JSX\.Element|\buse(?:State|Effect|Ref|Memo|Callback|Reducer|Context)\s*\(|\breturn\s*\(?\s*<[A-Za-z]"#;

const SVG: &str = r"(?i)<svg[\s>/]|<(?:path|circle|rect|polygon|polyline|ellipse|g)\s[^>]*>";

/// Last-chance code markers checked after markdown
const LOOSE_CODE: &str = r"\bfunction\b|\{[^}]*\}";

const MARKDOWN: &str = r"(?m)^#{1,6}\s+\S|^\s*[-*+]\s+\S|^\s*\d+\.\s+\S|\*\*[^*\n]+\*\*|\[[^\]\n]+\]\([^)\n]+\)|^```|^>\s";

/// Compiled type and language detector
#[derive(Debug)]
pub struct ContentDetector {
    html_document: Regex,
    component: Regex,
    svg: Regex,
    markdown: Regex,
    loose_code: Regex,
    languages: Vec<(&'static str, Regex)>,
}

impl ContentDetector {
    /// Compile the built-in detection patterns.
    pub fn new() -> Result<Self> {
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::Config(format!("Invalid detection pattern '{}': {}", name, e))
            })
        };

        let languages = LANGUAGE_PATTERNS
            .iter()
            .map(|(name, pattern)| Ok((*name, compile(name, pattern)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            html_document: compile("html_document", HTML_DOCUMENT)?,
            component: compile("component", COMPONENT)?,
            svg: compile("svg", SVG)?,
            markdown: compile("markdown", MARKDOWN)?,
            loose_code: compile("loose_code", LOOSE_CODE)?,
            languages,
        })
    }

    /// Detect the artifact type (and language for code) of some content.
    pub fn detect_type(&self, content: &str) -> TypeDetection {
        let view = code_view(content);

        if self.html_document.is_match(&view) {
            return TypeDetection::of(ArtifactType::Html, None);
        }
        if self.component.is_match(&view) {
            return TypeDetection::of(ArtifactType::InteractiveComponent, None);
        }
        if self.svg.is_match(&view) {
            return TypeDetection::of(ArtifactType::Svg, None);
        }
        if let Some(language) = self.detect_language(&view) {
            return TypeDetection::of(ArtifactType::Code, Some(language.to_string()));
        }
        if self.markdown.is_match(content) {
            return TypeDetection::of(ArtifactType::Markdown, None);
        }
        if self.loose_code.is_match(&view) {
            return TypeDetection::of(ArtifactType::Code, Some("javascript".to_string()));
        }

        tracing::debug!(
            chars = content.len(),
            "No content pattern matched, falling back to markdown"
        );
        TypeDetection {
            artifact_type: ArtifactType::Markdown,
            language: None,
            ambiguous: true,
        }
    }

    /// Detect the programming language of source text.
    pub fn detect_language(&self, content: &str) -> Option<&'static str> {
        if looks_like_json(content) {
            return Some("json");
        }

        self.languages
            .iter()
            .find(|(_, pattern)| pattern.is_match(content))
            .map(|(name, _)| *name)
    }
}

impl TypeDetection {
    fn of(artifact_type: ArtifactType, language: Option<String>) -> Self {
        Self {
            artifact_type,
            language,
            ambiguous: false,
        }
    }
}

fn looks_like_json(content: &str) -> bool {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }
    matches!(
        serde_json::from_str::<serde_json::Value>(trimmed),
        Ok(serde_json::Value::Object(_)) | Ok(serde_json::Value::Array(_))
    )
}

/// Text used for syntax detection.
///
/// A single fenced block is unwrapped; otherwise fenced blocks are dropped so
/// that code quoted inside a markdown document does not decide its type.
fn code_view(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() > 6 {
        let inner = &trimmed[3..trimmed.len() - 3];
        if !inner.contains("```") {
            // Skip the info string on the opening fence line
            return inner.split_once('\n').map(|(_, body)| body).unwrap_or("").to_string();
        }
    }

    let mut out = String::with_capacity(content.len());
    let mut in_fence = false;
    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
