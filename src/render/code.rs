//! Code renderer
//!
//! Read-only, escaped source view with lightweight lexical highlighting.
//! Highlighting is a single left-to-right scan recognizing comments,
//! strings, numbers and keywords of the language's family; every byte of
//! source text passes through HTML escaping, so nothing in a code artifact
//! can become markup.

use super::container::{Container, Element};
use super::{escape_attr, escape_html, RenderOptions, Renderer, RendererHandle};
use crate::error::Result;
use async_trait::async_trait;

/// Lexical rules for one language family
#[derive(Debug, Clone, Copy)]
struct Syntax {
    line_comments: &'static [&'static str],
    block_comment: Option<(&'static str, &'static str)>,
    quotes: &'static [char],
    keywords: &'static [&'static str],
    case_insensitive: bool,
}

const C_COMMENTS: &[&str] = &["//"];
const HASH_COMMENTS: &[&str] = &["#"];
const C_BLOCK: Option<(&str, &str)> = Some(("/*", "*/"));

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];
const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "nil", "true", "false",
];
const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "False", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return", "True", "try",
    "while", "with", "yield",
];
const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
    "delete", "do", "else", "export", "extends", "false", "finally", "for", "from", "function",
    "if", "import", "in", "instanceof", "interface", "let", "new", "null", "of", "return",
    "static", "super", "switch", "this", "throw", "true", "try", "type", "typeof", "undefined",
    "var", "void", "while", "yield",
];
const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "boolean", "break", "case", "catch", "char", "class", "continue", "default",
    "do", "double", "else", "enum", "extends", "false", "final", "finally", "float", "for",
    "if", "implements", "import", "instanceof", "int", "interface", "long", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "throws", "true", "try", "void", "while",
];
const CPP_KEYWORDS: &[&str] = &[
    "auto", "bool", "break", "case", "catch", "char", "class", "const", "continue", "default",
    "delete", "do", "double", "else", "enum", "false", "float", "for", "if", "include",
    "int", "long", "namespace", "new", "nullptr", "private", "protected", "public", "return",
    "sizeof", "static", "struct", "switch", "template", "this", "throw", "true", "try",
    "typedef", "typename", "using", "virtual", "void", "while",
];
const PHP_KEYWORDS: &[&str] = &[
    "array", "as", "break", "case", "class", "const", "continue", "default", "echo", "else",
    "elseif", "false", "for", "foreach", "function", "if", "include", "new", "null", "private",
    "protected", "public", "require", "return", "static", "switch", "true", "use", "while",
];
const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "insert", "into", "values", "update", "set", "delete", "create",
    "table", "index", "view", "drop", "alter", "join", "left", "right", "inner", "outer", "on",
    "group", "by", "order", "having", "limit", "and", "or", "not", "null", "as", "distinct",
    "primary", "key", "foreign", "references", "union", "case", "when", "then", "else", "end",
];
const BASH_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "do", "done", "case", "esac", "in",
    "function", "return", "local", "export", "echo", "exit",
];
const JSON_KEYWORDS: &[&str] = &["true", "false", "null"];

impl Syntax {
    fn for_language(language: &str) -> Option<Self> {
        let c_like = |keywords: &'static [&'static str]| Syntax {
            line_comments: C_COMMENTS,
            block_comment: C_BLOCK,
            quotes: &['"', '\'', '`'],
            keywords,
            case_insensitive: false,
        };

        Some(match language {
            "rust" => Syntax {
                quotes: &['"'],
                ..c_like(RUST_KEYWORDS)
            },
            "go" => c_like(GO_KEYWORDS),
            "javascript" | "typescript" | "jsx" | "tsx" => c_like(JS_KEYWORDS),
            "java" => Syntax {
                quotes: &['"', '\''],
                ..c_like(JAVA_KEYWORDS)
            },
            "cpp" => Syntax {
                quotes: &['"', '\''],
                ..c_like(CPP_KEYWORDS)
            },
            "php" => Syntax {
                line_comments: &["//", "#"],
                quotes: &['"', '\''],
                ..c_like(PHP_KEYWORDS)
            },
            "css" => Syntax {
                line_comments: &[],
                quotes: &['"', '\''],
                ..c_like(&[])
            },
            "python" => Syntax {
                line_comments: HASH_COMMENTS,
                block_comment: None,
                quotes: &['"', '\''],
                keywords: PYTHON_KEYWORDS,
                case_insensitive: false,
            },
            "bash" => Syntax {
                line_comments: HASH_COMMENTS,
                block_comment: None,
                quotes: &['"', '\''],
                keywords: BASH_KEYWORDS,
                case_insensitive: false,
            },
            "sql" => Syntax {
                line_comments: &["--"],
                block_comment: C_BLOCK,
                quotes: &['\''],
                keywords: SQL_KEYWORDS,
                case_insensitive: true,
            },
            "json" => Syntax {
                line_comments: &[],
                block_comment: None,
                quotes: &['"'],
                keywords: JSON_KEYWORDS,
                case_insensitive: false,
            },
            "html" | "xml" | "svg" => Syntax {
                line_comments: &[],
                block_comment: Some(("<!--", "-->")),
                quotes: &['"', '\''],
                keywords: &[],
                case_insensitive: false,
            },
            _ => return None,
        })
    }

    fn is_keyword(&self, word: &str) -> bool {
        if self.case_insensitive {
            let lower = word.to_ascii_lowercase();
            self.keywords.contains(&lower.as_str())
        } else {
            self.keywords.contains(&word)
        }
    }

    /// Length of a comment starting at the head of `rest`
    fn comment_len(&self, rest: &[char]) -> Option<usize> {
        for marker in self.line_comments {
            if starts_with(rest, marker) {
                return Some(rest.iter().position(|c| *c == '\n').unwrap_or(rest.len()));
            }
        }
        if let Some((open, close)) = self.block_comment {
            if starts_with(rest, open) {
                let from = open.chars().count();
                let close_len = close.chars().count();
                let end = (from..rest.len())
                    .find(|&j| starts_with(&rest[j..], close))
                    .map(|j| j + close_len)
                    .unwrap_or(rest.len());
                return Some(end);
            }
        }
        None
    }
}

fn starts_with(rest: &[char], pattern: &str) -> bool {
    let mut chars = rest.iter();
    pattern.chars().all(|p| chars.next() == Some(&p))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Length of a string literal opened by `rest[0]`
fn string_len(rest: &[char]) -> usize {
    let quote = rest[0];
    let mut j = 1;
    while j < rest.len() {
        match rest[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            '\n' if quote != '`' => return j,
            _ => j += 1,
        }
    }
    rest.len()
}

fn push_span(out: &mut String, class: &str, text: &[char]) {
    let text: String = text.iter().collect();
    out.push_str(&format!(
        r#"<span class="tok-{}">{}</span>"#,
        class,
        escape_html(&text)
    ));
}

/// Canonical language name for common aliases
pub fn normalize_language(language: &str) -> String {
    let lower = language.trim().to_ascii_lowercase();
    match lower.as_str() {
        "js" | "mjs" | "node" => "javascript",
        "ts" => "typescript",
        "py" | "python3" => "python",
        "rs" => "rust",
        "golang" => "go",
        "sh" | "shell" | "zsh" => "bash",
        "c" | "c++" | "cc" | "hpp" | "h" => "cpp",
        "" => "text",
        other => other,
    }
    .to_string()
}

/// Highlight source text as escaped markup with `tok-*` spans.
pub fn highlight(source: &str, language: &str) -> String {
    let Some(syntax) = Syntax::for_language(language) else {
        return escape_html(source);
    };

    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let rest = &chars[i..];
        let c = rest[0];

        if let Some(len) = syntax.comment_len(rest) {
            push_span(&mut out, "comment", &rest[..len]);
            i += len;
        } else if syntax.quotes.contains(&c) {
            let len = string_len(rest).min(rest.len());
            push_span(&mut out, "string", &rest[..len]);
            i += len;
        } else if c.is_ascii_digit() && (i == 0 || !is_ident(chars[i - 1])) {
            let len = rest
                .iter()
                .position(|ch| !(ch.is_ascii_alphanumeric() || *ch == '.' || *ch == '_'))
                .unwrap_or(rest.len());
            push_span(&mut out, "number", &rest[..len]);
            i += len;
        } else if is_ident_start(c) {
            let len = rest.iter().position(|ch| !is_ident(*ch)).unwrap_or(rest.len());
            let word: String = rest[..len].iter().collect();
            if syntax.is_keyword(&word) {
                push_span(&mut out, "keyword", &rest[..len]);
            } else {
                out.push_str(&escape_html(&word));
            }
            i += len;
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&escape_html(c.encode_utf8(&mut buf)));
            i += 1;
        }
    }

    out
}

/// Renderer for `code` artifacts
#[derive(Debug, Default)]
pub struct CodeRenderer;

impl CodeRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for CodeRenderer {
    async fn render(
        &self,
        content: &str,
        container: &Container,
        options: &RenderOptions,
    ) -> Result<RendererHandle> {
        let language = normalize_language(options.language.as_deref().unwrap_or("text"));
        let body = highlight(content, &language);
        let lines = content.lines().count();

        let inner = format!(
            r#"<div class="artifact-code-header"><span class="artifact-code-language">{}</span></div><pre><code class="language-{}">{}</code></pre>"#,
            escape_html(&language),
            escape_attr(&language),
            body
        );
        container
            .replace(
                Element::new("div")
                    .attr("class", "artifact-code")
                    .attr("data-language", language.clone())
                    .inner_html(inner),
            )
            .await;

        Ok(RendererHandle::Code { language, lines })
    }

    fn name(&self) -> &str {
        "code"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_highlighting() {
        let out = highlight("fn main() { let x = 42; // answer\n}", "rust");
        assert!(out.contains(r#"<span class="tok-keyword">fn</span> main"#));
        assert!(out.contains(r#"<span class="tok-keyword">let</span>"#));
        assert!(out.contains(r#"<span class="tok-number">42</span>"#));
        assert!(out.contains(r#"<span class="tok-comment">// answer</span>"#));
    }

    #[test]
    fn test_strings_are_escaped() {
        let out = highlight(r#"const s = "<script>alert(1)</script>";"#, "javascript");
        assert!(!out.contains("<script>"));
        assert!(out.contains(r#"<span class="tok-string">"&lt;script&gt;alert(1)&lt;/script&gt;"</span>"#));
    }

    #[test]
    fn test_unknown_language_is_plain_escaped() {
        assert_eq!(highlight("a < b && c", "text"), "a &lt; b &amp;&amp; c");
    }

    #[test]
    fn test_sql_keywords_case_insensitive() {
        let out = highlight("SELECT id FROM t -- all", "sql");
        assert!(out.contains(r#"<span class="tok-keyword">SELECT</span>"#));
        assert!(out.contains(r#"<span class="tok-keyword">FROM</span>"#));
        assert!(out.contains(r#"<span class="tok-comment">-- all</span>"#));
    }

    #[test]
    fn test_python_hash_comment_and_unterminated_string() {
        let out = highlight("x = 'open\n# note", "python");
        assert!(out.contains(r#"<span class="tok-string">'open</span>"#));
        assert!(out.contains(r#"<span class="tok-comment"># note</span>"#));
    }

    #[test]
    fn test_identifier_digits_not_numbers() {
        let out = highlight("let v2 = 3;", "rust");
        assert!(out.contains("v2"));
        assert!(!out.contains(r#"tok-number">2<"#));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("JS"), "javascript");
        assert_eq!(normalize_language("py"), "python");
        assert_eq!(normalize_language(""), "text");
        assert_eq!(normalize_language("haskell"), "haskell");
    }

    #[tokio::test]
    async fn test_render_code_view() {
        let container = Container::new("c1");
        let options = RenderOptions {
            language: Some("py".to_string()),
            ..Default::default()
        };
        let handle = CodeRenderer::new()
            .render("def f():\n    return 1\n", &container, &options)
            .await
            .unwrap();

        assert_eq!(
            handle,
            RendererHandle::Code {
                language: "python".to_string(),
                lines: 2
            }
        );
        let children = container.children().await;
        assert_eq!(children[0].attribute("data-language"), Some("python"));
        assert!(children[0].inner_html.contains("<pre><code class=\"language-python\">"));
    }
}
