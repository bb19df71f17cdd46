//! Markdown renderer
//!
//! Converts markdown to static markup. Raw HTML in the source is not passed
//! through: all text is escaped, and link or image URLs with a scheme other
//! than http, https or mailto are replaced by `#`.
//!
//! Supported blocks: ATX headings, paragraphs, fenced code, block quotes
//! (nested blocks allowed), ordered and unordered lists, thematic breaks.
//! Inline: code spans, links, images, strong, emphasis, strikethrough.

use super::container::{Container, Element};
use super::{escape_attr, escape_html, RenderOptions, Renderer, RendererHandle};
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Block quotes nested deeper than this render their remaining text as a
/// plain paragraph.
const MAX_QUOTE_DEPTH: usize = 32;

/// Counts reported in the render handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkdownStats {
    pub blocks: usize,
    pub headings: usize,
}

/// Renderer for `markdown` artifacts
#[derive(Debug)]
pub struct MarkdownRenderer {
    emphasis: Vec<(Regex, &'static str)>,
}

impl MarkdownRenderer {
    pub fn new() -> Result<Self> {
        let rules = [
            (r"\*\*([^*\n]+?)\*\*", "<strong>$1</strong>"),
            (r"\b__([^_\n]+?)__\b", "<strong>$1</strong>"),
            (r"\*([^*\s][^*\n]*?)\*", "<em>$1</em>"),
            (r"\b_([^_\s][^_\n]*?)_\b", "<em>$1</em>"),
            (r"~~([^~\n]+?)~~", "<del>$1</del>"),
        ];
        let emphasis = rules
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, *replacement))
                    .map_err(|e| Error::Config(format!("Invalid markdown pattern: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { emphasis })
    }

    /// Convert markdown to markup.
    pub fn to_html(&self, source: &str) -> (String, MarkdownStats) {
        let lines: Vec<&str> = source.lines().collect();
        let mut stats = MarkdownStats::default();
        let html = self.blocks(&lines, 0, &mut stats);
        (html, stats)
    }

    fn blocks(&self, lines: &[&str], depth: usize, stats: &mut MarkdownStats) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let trimmed = lines[i].trim();
            if trimmed.is_empty() {
                i += 1;
                continue;
            }
            stats.blocks += 1;

            if let Some(info) = trimmed.strip_prefix("```") {
                let mut body = Vec::new();
                i += 1;
                while i < lines.len() && !lines[i].trim_start().starts_with("```") {
                    body.push(lines[i]);
                    i += 1;
                }
                i += 1;

                let language = info.trim();
                let class = if language.is_empty() {
                    String::new()
                } else {
                    format!(r#" class="language-{}""#, escape_attr(language))
                };
                out.push(format!(
                    "<pre><code{}>{}</code></pre>",
                    class,
                    escape_html(&body.join("\n"))
                ));
                continue;
            }

            if let Some((level, text)) = heading(trimmed) {
                stats.headings += 1;
                out.push(format!("<h{0}>{1}</h{0}>", level, self.inline(text)));
                i += 1;
                continue;
            }

            if is_rule(trimmed) {
                out.push("<hr>".to_string());
                i += 1;
                continue;
            }

            if trimmed.starts_with('>') {
                let mut inner = Vec::new();
                while i < lines.len() && lines[i].trim_start().starts_with('>') {
                    let line = lines[i].trim_start()[1..].to_string();
                    inner.push(line.strip_prefix(' ').map(str::to_string).unwrap_or(line));
                    i += 1;
                }
                let body = if depth + 1 >= MAX_QUOTE_DEPTH {
                    format!("<p>{}</p>", escape_html(&inner.join("\n")))
                } else {
                    let inner_refs: Vec<&str> = inner.iter().map(String::as_str).collect();
                    let mut inner_stats = MarkdownStats::default();
                    let body = self.blocks(&inner_refs, depth + 1, &mut inner_stats);
                    stats.headings += inner_stats.headings;
                    body
                };
                out.push(format!("<blockquote>\n{}\n</blockquote>", body));
                continue;
            }

            if let Some((ordered, _)) = list_item(trimmed) {
                let mut items: Vec<String> = Vec::new();
                while i < lines.len() {
                    let t = lines[i].trim();
                    match list_item(t) {
                        Some((o, text)) if o == ordered => {
                            items.push(text.to_string());
                            i += 1;
                        }
                        Some(_) => break,
                        None if !t.is_empty()
                            && !starts_block(t)
                            && lines[i].starts_with(char::is_whitespace) =>
                        {
                            // Indented continuation of the previous item
                            if let Some(last) = items.last_mut() {
                                last.push(' ');
                                last.push_str(t);
                            }
                            i += 1;
                        }
                        None => break,
                    }
                }

                let tag = if ordered { "ol" } else { "ul" };
                let body: String = items
                    .iter()
                    .map(|item| format!("<li>{}</li>", self.inline(item)))
                    .collect();
                out.push(format!("<{0}>{1}</{0}>", tag, body));
                continue;
            }

            let mut paragraph = Vec::new();
            while i < lines.len() {
                let t = lines[i].trim();
                if t.is_empty() || (!paragraph.is_empty() && starts_block(t)) {
                    break;
                }
                paragraph.push(t);
                i += 1;
            }
            out.push(format!("<p>{}</p>", self.inline(&paragraph.join("\n"))));
        }

        out.join("\n")
    }

    fn inline(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut plain = String::new();
        let mut rest = text;

        while let Some(c) = rest.chars().next() {
            if c == '`' {
                if let Some(end) = rest[1..].find('`') {
                    out.push_str(&self.flush(&mut plain));
                    out.push_str(&format!("<code>{}</code>", escape_html(&rest[1..1 + end])));
                    rest = &rest[end + 2..];
                    continue;
                }
            }

            if c == '!' && rest[1..].starts_with('[') {
                if let Some((alt, url, consumed)) = parse_link(&rest[1..]) {
                    out.push_str(&self.flush(&mut plain));
                    out.push_str(&format!(
                        r#"<img src="{}" alt="{}">"#,
                        safe_url(url),
                        escape_attr(alt)
                    ));
                    rest = &rest[1 + consumed..];
                    continue;
                }
            }

            if c == '[' {
                if let Some((label, url, consumed)) = parse_link(rest) {
                    out.push_str(&self.flush(&mut plain));
                    out.push_str(&format!(
                        r#"<a href="{}" rel="noopener noreferrer">{}</a>"#,
                        safe_url(url),
                        self.inline(label)
                    ));
                    rest = &rest[consumed..];
                    continue;
                }
            }

            plain.push(c);
            rest = &rest[c.len_utf8()..];
        }

        out.push_str(&self.flush(&mut plain));
        out
    }

    fn flush(&self, plain: &mut String) -> String {
        if plain.is_empty() {
            return String::new();
        }
        let mut html = escape_html(plain);
        for (regex, replacement) in &self.emphasis {
            html = regex.replace_all(&html, *replacement).into_owned();
        }
        plain.clear();
        html
    }
}

/// `(level, text)` of an ATX heading
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim_end()))
}

fn is_rule(line: &str) -> bool {
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|m| compact.iter().all(|c| c == m))
}

/// `(ordered, text)` of a list item
fn list_item(line: &str) -> Option<(bool, &str)> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(text) = line.strip_prefix(marker) {
            return Some((false, text.trim()));
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 && digits <= 9 {
        let rest = &line[digits..];
        if let Some(text) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some((true, text.trim()));
        }
    }
    None
}

fn starts_block(line: &str) -> bool {
    line.starts_with("```")
        || line.starts_with('>')
        || heading(line).is_some()
        || is_rule(line)
        || list_item(line).is_some()
}

/// `(label, url, consumed_bytes)` for `[label](url "title")` at the head of `text`
fn parse_link(text: &str) -> Option<(&str, &str, usize)> {
    let close = text.find(']')?;
    let label = &text[1..close];
    let after = &text[close + 1..];
    if !after.starts_with('(') {
        return None;
    }
    let end = after.find(')')?;
    let target = after[1..end].trim();
    let url = match target.find(" \"").or_else(|| target.find(" '")) {
        Some(title) => target[..title].trim(),
        None => target,
    };
    Some((label, url, close + 1 + end + 1))
}

/// Escaped URL, or `#` for unsafe schemes
fn safe_url(url: &str) -> String {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let scheme_end = compact.find(':');
    let path_start = compact.find(|c: char| matches!(c, '/' | '?' | '#'));

    if let Some(colon) = scheme_end {
        if path_start.map_or(true, |p| colon < p) {
            let scheme = compact[..colon].to_ascii_lowercase();
            if !SAFE_SCHEMES.contains(&scheme.as_str()) {
                return "#".to_string();
            }
        }
    }
    escape_attr(url)
}

#[async_trait]
impl Renderer for MarkdownRenderer {
    async fn render(
        &self,
        content: &str,
        container: &Container,
        _options: &RenderOptions,
    ) -> Result<RendererHandle> {
        let (html, stats) = self.to_html(content);
        container
            .replace(
                Element::new("div")
                    .attr("class", "artifact-markdown")
                    .inner_html(html),
            )
            .await;

        Ok(RendererHandle::Markdown {
            blocks: stats.blocks,
            headings: stats.headings,
        })
    }

    fn name(&self) -> &str {
        "markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(source: &str) -> String {
        MarkdownRenderer::new().unwrap().to_html(source).0
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let (html, stats) = MarkdownRenderer::new()
            .unwrap()
            .to_html("# Title\n\nFirst line\nsecond line\n\n## Sub ##");
        assert_eq!(
            html,
            "<h1>Title</h1>\n<p>First line\nsecond line</p>\n<h2>Sub</h2>"
        );
        assert_eq!(stats, MarkdownStats { blocks: 3, headings: 2 });
    }

    #[test]
    fn test_lists() {
        assert_eq!(md("- a\n- b\n  continued"), "<ul><li>a</li><li>b continued</li></ul>");
        assert_eq!(md("1. one\n2) two"), "<ol><li>one</li><li>two</li></ol>");
        assert_eq!(
            md("- a\n1. b"),
            "<ul><li>a</li></ul>\n<ol><li>b</li></ol>"
        );
    }

    #[test]
    fn test_fenced_code_is_escaped() {
        assert_eq!(
            md("```html\n<script>x</script>\n```"),
            "<pre><code class=\"language-html\">&lt;script&gt;x&lt;/script&gt;</code></pre>"
        );
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        assert_eq!(md("```\na\nb"), "<pre><code>a\nb</code></pre>");
    }

    #[test]
    fn test_blockquote_and_rule() {
        assert_eq!(
            md("> quoted **bold**\n> - item\n\n---"),
            "<blockquote>\n<p>quoted <strong>bold</strong></p>\n<ul><li>item</li></ul>\n</blockquote>\n<hr>"
        );
    }

    #[test]
    fn test_deeply_nested_quotes_are_capped() {
        let source = format!("{}x", ">".repeat(200_000));
        let html = md(&source);
        assert_eq!(html.matches("<blockquote>").count(), MAX_QUOTE_DEPTH);
        assert!(html.contains("x</p>"));

        let shallow = md("> > a");
        assert_eq!(
            shallow,
            "<blockquote>\n<blockquote>\n<p>a</p>\n</blockquote>\n</blockquote>"
        );
    }

    #[test]
    fn test_inline_formatting() {
        assert_eq!(
            md("Use `a < b` and *em* or _em_, ~~old~~ __strong__"),
            "<p>Use <code>a &lt; b</code> and <em>em</em> or <em>em</em>, <del>old</del> <strong>strong</strong></p>"
        );
    }

    #[test]
    fn test_snake_case_identifiers_untouched() {
        assert_eq!(md("call my_func_name now"), "<p>call my_func_name now</p>");
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            md("[docs](https://example.com/a?b=1&c=2 \"Title\")"),
            "<p><a href=\"https://example.com/a?b=1&amp;c=2\" rel=\"noopener noreferrer\">docs</a></p>"
        );
        assert_eq!(
            md("![logo](/img/logo.png)"),
            "<p><img src=\"/img/logo.png\" alt=\"logo\"></p>"
        );
    }

    #[test]
    fn test_unsafe_links_neutralized() {
        for source in [
            "[x](javascript:alert(1))",
            "[x](JavaScript:alert(1))",
            "[x](java\tscript:alert(1))",
            "[x](data:text/html;base64,PHNjcmlwdD4=)",
            "[x](vbscript:msgbox)",
        ] {
            let html = md(source);
            assert!(html.contains("href=\"#\""), "{source} -> {html}");
        }
    }

    #[test]
    fn test_raw_html_escaped() {
        assert_eq!(
            md("<img src=x onerror=alert(1)>"),
            "<p>&lt;img src=x onerror=alert(1)&gt;</p>"
        );
    }

    #[tokio::test]
    async fn test_render_into_container() {
        let renderer = MarkdownRenderer::new().unwrap();
        let container = Container::new("c1");
        let handle = renderer
            .render("# A\n\ntext", &container, &RenderOptions::default())
            .await
            .unwrap();

        assert_eq!(handle, RendererHandle::Markdown { blocks: 2, headings: 1 });
        let children = container.children().await;
        assert_eq!(children[0].attribute("class"), Some("artifact-markdown"));
    }
}
