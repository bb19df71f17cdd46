//! Markup stripping
//!
//! Removes active-content vectors from HTML and SVG: dangerous elements with
//! their bodies, stray or unterminated dangerous tags, event-handler
//! attributes, and script-bearing URLs. Passes repeat until the text stops
//! changing, so fragments reassembled by an earlier removal
//! (`<scr<script></script>ipt>`) are caught and the result is idempotent.
//! Every changing pass strictly shortens the text, which bounds the loop.
//!
//! Attributes are found by walking each tag the way a browser tokenizer
//! does: quoted values may contain `>`, `/` separates attributes, and an
//! unquoted value runs to whitespace or `>`. Raw-text elements (`style`,
//! `textarea`, ...) are scanned separately up to their closing tag so a
//! quote inside them cannot hide a following tag.

use crate::error::{Error, Result};
use regex::Regex;

/// Attributes whose value is navigated to or fetched as a URL
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "data",
    "poster",
    "background",
    "lowsrc",
    "dynsrc",
    "ping",
    "cite",
    "codebase",
];

/// URL schemes that execute instead of navigating
const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

/// Elements whose body the browser reads as text up to the closing tag
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
    "plaintext",
];

/// Counts of what a strip removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
    pub elements: usize,
    pub attributes: usize,
    pub urls: usize,
    pub passes: usize,
}

impl StripReport {
    /// Whether anything was removed
    pub fn is_clean(&self) -> bool {
        self.elements == 0 && self.attributes == 0 && self.urls == 0
    }
}

#[derive(Debug)]
struct ElementRule {
    name: String,
    paired: Regex,
    stray: Regex,
    unterminated: Regex,
}

/// One attribute inside a tag, as byte offsets into the tag text
#[derive(Debug)]
struct Attribute {
    /// Start of the separator preceding the name
    start: usize,
    name: (usize, usize),
    /// Raw value including quotes
    value: Option<(usize, usize)>,
    end: usize,
}

/// A start or end tag found by [`scan_tag`]
#[derive(Debug)]
struct TagSpan {
    name_end: usize,
    attributes: Vec<Attribute>,
    /// Tag length including `>`, or the rest of the input when unterminated
    len: usize,
    closing: bool,
}

/// Regex-driven markup stripper
#[derive(Debug)]
pub struct MarkupStripper {
    elements: Vec<ElementRule>,
    strip_event_handlers: bool,
    strip_javascript_urls: bool,
}

impl MarkupStripper {
    /// Build a stripper removing `elements`, optionally also event handlers and
    /// `javascript:` URLs.
    pub fn new(
        elements: &[String],
        strip_event_handlers: bool,
        strip_javascript_urls: bool,
    ) -> Result<Self> {
        let compile = |pattern: String| {
            Regex::new(&pattern)
                .map_err(|e| Error::Config(format!("Invalid markup pattern '{}': {}", pattern, e)))
        };

        let elements = elements
            .iter()
            .map(|name| {
                let tag = regex::escape(&name.to_lowercase());
                Ok(ElementRule {
                    name: name.to_lowercase(),
                    paired: compile(format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))?,
                    stray: compile(format!(r"(?i)</?{tag}\b[^>]*>"))?,
                    unterminated: compile(format!(r"(?i)<{tag}\b[^>]*$"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            elements,
            strip_event_handlers,
            strip_javascript_urls,
        })
    }

    /// Stripper that only removes `<script>` elements
    pub fn scripts_only() -> Result<Self> {
        Self::new(&["script".to_string()], false, false)
    }

    /// Strip to a fixpoint
    pub fn strip(&self, input: &str) -> (String, StripReport) {
        let mut report = StripReport::default();
        let mut current = input.to_string();

        loop {
            let next = self.strip_once(&current, &mut report);
            report.passes += 1;
            if next == current {
                return (current, report);
            }
            current = next;
        }
    }

    fn strip_once(&self, input: &str, report: &mut StripReport) -> String {
        let mut text = input.to_string();

        for rule in &self.elements {
            for pattern in [&rule.paired, &rule.stray, &rule.unterminated] {
                let count = pattern.find_iter(&text).count();
                if count > 0 {
                    tracing::trace!(element = %rule.name, count, "Stripping element");
                    report.elements += count;
                    text = pattern.replace_all(&text, "").into_owned();
                }
            }
        }

        if self.strip_event_handlers || self.strip_javascript_urls {
            text = self.rewrite_tags(&text, true, report);
        }

        text
    }

    /// Walk `input` tag by tag, rewriting attributes. Raw-text bodies are
    /// scanned as a bounded slice when `raw_text` is set and skipped over
    /// otherwise, which keeps the walk at most two levels deep.
    fn rewrite_tags(&self, input: &str, raw_text: bool, report: &mut StripReport) -> String {
        let mut out = String::with_capacity(input.len());
        let mut i = 0;

        while i < input.len() {
            let Some(offset) = input[i..].find('<') else {
                out.push_str(&input[i..]);
                break;
            };
            let lt = i + offset;
            out.push_str(&input[i..lt]);
            let rest = &input[lt..];

            if rest.starts_with("<!--") {
                let end = comment_end(rest);
                out.push_str(&rest[..end]);
                i = lt + end;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest.find('>').map_or(rest.len(), |p| p + 1);
                out.push_str(&rest[..end]);
                i = lt + end;
            } else if let Some(tag) = scan_tag(rest) {
                out.push_str(&self.rewrite_tag(&rest[..tag.len], &tag, report));
                i = lt + tag.len;

                let name_start = if tag.closing { 2 } else { 1 };
                let name = rest[name_start..tag.name_end].to_ascii_lowercase();
                if raw_text && !tag.closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    let body = &input[i..];
                    let end = raw_text_end(body, &name);
                    out.push_str(&self.rewrite_tags(&body[..end], false, report));
                    i += end;
                }
            } else {
                out.push('<');
                i = lt + 1;
            }
        }

        out
    }

    fn rewrite_tag(&self, text: &str, tag: &TagSpan, report: &mut StripReport) -> String {
        let mut out = String::with_capacity(text.len());
        out.push_str(&text[..tag.name_end]);
        let mut last = tag.name_end;

        for attr in &tag.attributes {
            let name = text[attr.name.0..attr.name.1].to_ascii_lowercase();

            if self.strip_event_handlers && name.len() > 2 && name.starts_with("on") {
                tracing::trace!(attribute = %name, "Stripping event handler");
                report.attributes += 1;
            } else if let Some((vs, _)) = attr.value.filter(|&(vs, ve)| {
                self.strip_javascript_urls
                    && URL_ATTRIBUTES.contains(&name.as_str())
                    && is_script_url(&text[vs..ve])
            }) {
                tracing::trace!(attribute = %name, "Neutralizing script URL");
                report.urls += 1;
                out.push_str(&text[attr.start..vs]);
                out.push_str("\"#\"");
            } else {
                out.push_str(&text[attr.start..attr.end]);
            }
            last = attr.end;
        }

        out.push_str(&text[last..]);
        out
    }
}

fn is_tag_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

/// Scan a tag at the start of `text` (which begins with `<`). Returns `None`
/// when the `<` does not open a tag.
fn scan_tag(text: &str) -> Option<TagSpan> {
    let bytes = text.as_bytes();
    let closing = bytes.get(1) == Some(&b'/');
    let name_start = if closing { 2 } else { 1 };
    if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }

    let mut p = name_start;
    while p < bytes.len() && !is_tag_space(bytes[p]) && bytes[p] != b'/' && bytes[p] != b'>' {
        p += 1;
    }
    let name_end = p;
    let mut attributes = Vec::new();

    loop {
        let start = p;
        while p < bytes.len() && (is_tag_space(bytes[p]) || bytes[p] == b'/') {
            p += 1;
        }
        if p >= bytes.len() {
            return Some(TagSpan { name_end, attributes, len: bytes.len(), closing });
        }
        if bytes[p] == b'>' {
            return Some(TagSpan { name_end, attributes, len: p + 1, closing });
        }

        let name_from = p;
        if bytes[p] == b'=' {
            p += 1;
        }
        while p < bytes.len()
            && !is_tag_space(bytes[p])
            && !matches!(bytes[p], b'/' | b'>' | b'=')
        {
            p += 1;
        }
        let name = (name_from, p);

        let mut q = p;
        while q < bytes.len() && is_tag_space(bytes[q]) {
            q += 1;
        }
        let mut value = None;
        if bytes.get(q) == Some(&b'=') {
            q += 1;
            while q < bytes.len() && is_tag_space(bytes[q]) {
                q += 1;
            }
            let value_start = q;
            match bytes.get(q) {
                Some(&(quote @ (b'"' | b'\''))) => {
                    q += 1;
                    while q < bytes.len() && bytes[q] != quote {
                        q += 1;
                    }
                    q = (q + 1).min(bytes.len());
                }
                _ => {
                    while q < bytes.len() && !is_tag_space(bytes[q]) && bytes[q] != b'>' {
                        q += 1;
                    }
                }
            }
            if q > value_start {
                value = Some((value_start, q));
            }
            p = q;
        }

        attributes.push(Attribute { start, name, value, end: p });
    }
}

/// Length of the comment at the start of `text` (which begins with `<!--`),
/// ending where a browser ends it.
fn comment_end(text: &str) -> usize {
    let body = &text[4..];
    if body.starts_with('>') {
        return 5;
    }
    if body.starts_with("->") {
        return 6;
    }
    [body.find("-->").map(|p| p + 3), body.find("--!>").map(|p| p + 4)]
        .into_iter()
        .flatten()
        .min()
        .map_or(text.len(), |end| end + 4)
}

/// Offset of the closing `</name` of a raw-text element body.
fn raw_text_end(body: &str, name: &str) -> usize {
    if name == "plaintext" {
        return body.len();
    }
    let lower = body.to_ascii_lowercase();
    let needle = format!("</{}", name);
    let mut from = 0;
    while let Some(p) = lower[from..].find(&needle) {
        let at = from + p;
        match lower.as_bytes().get(at + needle.len()) {
            None => return at,
            Some(&b) if is_tag_space(b) || b == b'/' || b == b'>' => return at,
            _ => from = at + needle.len(),
        }
    }
    body.len()
}

/// Whether an attribute value resolves to a script-executing URL once
/// character references, whitespace and control characters are removed.
fn is_script_url(raw: &str) -> bool {
    let unquoted = raw
        .strip_prefix(['"', '\''])
        .map(|v| v.strip_suffix(['"', '\'']).unwrap_or(v))
        .unwrap_or(raw);
    let decoded: String = decode_references(unquoted)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect();
    SCRIPT_SCHEMES.iter().any(|scheme| decoded.starts_with(scheme))
}

/// Decode numeric character references and the named ones browsers accept
/// inside URL schemes.
fn decode_references(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        if let Some((c, used)) = decode_reference(rest) {
            out.push(c);
            rest = &rest[used..];
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(text: &str) -> Option<(char, usize)> {
    const NAMED: &[(&str, char)] = &[
        ("&colon;", ':'),
        ("&tab;", '\t'),
        ("&newline;", '\n'),
        ("&lpar;", '('),
        ("&rpar;", ')'),
    ];
    let lower = text.chars().take(10).collect::<String>().to_ascii_lowercase();
    for (name, c) in NAMED {
        if lower.starts_with(name) {
            return Some((*c, name.len()));
        }
    }

    let body = text.strip_prefix("&#")?;
    let (radix, digits_at) = match body.as_bytes().first() {
        Some(b'x' | b'X') => (16, 3),
        _ => (10, 2),
    };
    let digits: String = text[digits_at..]
        .chars()
        .take_while(|c| c.is_digit(radix))
        .collect();
    if digits.is_empty() {
        return None;
    }
    let mut used = digits_at + digits.len();
    if text[used..].starts_with(';') {
        used += 1;
    }
    let c = u32::from_str_radix(&digits, radix)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or('\u{fffd}');
    Some((c, used))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_stripper() -> MarkupStripper {
        let elements: Vec<String> = ["script", "object", "embed", "iframe", "form"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        MarkupStripper::new(&elements, true, true).unwrap()
    }

    #[test]
    fn test_removes_script_with_body() {
        let s = html_stripper();
        let (out, report) = s.strip("<p>hi</p><script>alert(1)</script><p>bye</p>");
        assert_eq!(out, "<p>hi</p><p>bye</p>");
        assert_eq!(report.elements, 1);
    }

    #[test]
    fn test_case_insensitive_multiline() {
        let s = html_stripper();
        let (out, _) = s.strip("<SCRIPT type=\"text/javascript\">\nvar x = 1;\n</Script >ok");
        assert_eq!(out, "ok");
    }

    #[test]
    fn test_nested_reassembly_is_caught() {
        let s = html_stripper();
        let (out, report) = s.strip("<scr<script>x</script>ipt>alert(1)</script>");
        assert!(!out.to_lowercase().contains("<script"));
        assert!(report.passes >= 2);
    }

    #[test]
    fn test_unterminated_tag_removed() {
        let s = html_stripper();
        let (out, _) = s.strip("<p>a</p><script src=evil.js");
        assert_eq!(out, "<p>a</p>");
    }

    #[test]
    fn test_stray_open_tag_removed() {
        let s = html_stripper();
        let (out, _) = s.strip("<div><embed src=\"x.swf\"></div>");
        assert_eq!(out, "<div></div>");
    }

    #[test]
    fn test_event_handlers_removed() {
        let s = html_stripper();
        let (out, report) =
            s.strip(r#"<img src="a.png" onerror="alert(1)" alt='x' onload=go()>"#);
        assert_eq!(out, r#"<img src="a.png" alt='x'>"#);
        assert_eq!(report.attributes, 2);
    }

    #[test]
    fn test_quoted_gt_does_not_hide_handler() {
        let s = html_stripper();
        let (out, report) = s.strip(r#"<img alt=">" src=x onerror="alert(1)">"#);
        assert_eq!(out, r#"<img alt=">" src=x>"#);
        assert_eq!(report.attributes, 1);

        let (out, _) = s.strip(r#"<p title='a>b' onclick=go()>t</p>"#);
        assert_eq!(out, r#"<p title='a>b'>t</p>"#);
    }

    #[test]
    fn test_handler_inside_raw_text_boundary() {
        let s = html_stripper();
        let (out, _) =
            s.strip(r#"<style>a[title="</style><img src=x onerror=alert(1)>"]</style>"#);
        assert!(!out.contains("onerror"), "{out}");

        let (out, _) = s.strip("<!-- a --!><img src=x onerror=alert(1)>");
        assert_eq!(out, "<!-- a --!><img src=x>");
    }

    #[test]
    fn test_slash_separated_handler_removed() {
        let s = html_stripper();
        let (out, _) = s.strip("<svg/onload=alert(1)>");
        assert!(!out.contains("onload"));
    }

    #[test]
    fn test_javascript_urls_neutralized() {
        let s = html_stripper();
        let (out, report) = s.strip(r#"<a href="javascript:alert(1)">x</a><a href='https://ok'>y</a>"#);
        assert_eq!(out, r##"<a href="#">x</a><a href='https://ok'>y</a>"##);
        assert_eq!(report.urls, 1);
    }

    #[test]
    fn test_obfuscated_javascript_urls_neutralized() {
        let s = html_stripper();
        let (out, report) = s.strip("<a/href=javascript:alert(1)>x</a>");
        assert_eq!(out, r##"<a/href="#">x</a>"##);
        assert_eq!(report.urls, 1);

        for input in [
            r#"<a href="java&#x73;cript:alert(1)">x</a>"#,
            r#"<a href="javascript&colon;alert(1)">x</a>"#,
            r#"<a href=" &#106;ava&#9;script:alert(1)">x</a>"#,
            r#"<a HREF = 'JavaScript:alert(1)'>x</a>"#,
        ] {
            let (out, _) = s.strip(input);
            assert!(!out.to_lowercase().contains("script"), "{input} -> {out}");
            assert!(out.contains(r##""#""##), "{input} -> {out}");
        }
    }

    #[test]
    fn test_safe_urls_kept() {
        let s = html_stripper();
        let input = r#"<img src="data:image/png;base64,AAAA"><a href="/docs?q=javascript">d</a>"#;
        let (out, report) = s.strip(input);
        assert_eq!(out, input);
        assert!(report.is_clean());
    }

    #[test]
    fn test_strip_is_idempotent() {
        let s = html_stripper();
        let inputs = [
            "<p onclick=\"x()\">a</p><script>b</script>",
            "<scr<script></script>ipt>c</script>",
            "<a href=javascript:void(0)>d</a>",
            r#"<img alt=">" onerror=x>"#,
            "<a/href=java&#x73;cript:x>",
            "<p title=\"unterminated",
            "plain text",
        ];
        for input in inputs {
            let (once, _) = s.strip(input);
            let (twice, report) = s.strip(&once);
            assert_eq!(once, twice, "{input}");
            assert!(report.is_clean());
        }
    }

    #[test]
    fn test_scripts_only_keeps_handlers() {
        let s = MarkupStripper::scripts_only().unwrap();
        let (out, _) = s.strip(r#"<svg onload="x()"><script>y()</script><rect/></svg>"#);
        assert_eq!(out, r#"<svg onload="x()"><rect/></svg>"#);
    }

    #[test]
    fn test_safe_markup_untouched() {
        let s = html_stripper();
        let input = "<div class=\"card\"><h1>Title</h1><p>Online only</p></div>";
        let (out, report) = s.strip(input);
        assert_eq!(out, input);
        assert!(report.is_clean());
        assert_eq!(report.passes, 1);
    }
}
