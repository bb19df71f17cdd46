use artifact_sandbox::config::SanitizerConfig;
use artifact_sandbox::sanitizer::ContentSanitizer;
use artifact_sandbox::ArtifactType;
use proptest::prelude::*;
use regex::Regex;

fn sanitizer() -> ContentSanitizer {
    ContentSanitizer::new(&SanitizerConfig::default()).unwrap()
}

// Markup-ish fragments, weighted towards the constructs the stripper targets
fn arb_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("<script>".to_string()),
        Just("</script>".to_string()),
        Just("<scr".to_string()),
        Just("ipt>".to_string()),
        Just("<iframe src=x>".to_string()),
        Just("</iframe>".to_string()),
        Just("<object data=x>".to_string()),
        Just("<embed src=x>".to_string()),
        Just(" onclick=\"a()\"".to_string()),
        Just(" onload=b()".to_string()),
        Just(" href=\"javascript:alert(1)\"".to_string()),
        Just(" src='javascript:x'".to_string()),
        Just(" alt=\">\"".to_string()),
        Just("/href=javascript:x".to_string()),
        Just(" href=\"java&#x73;cript:x\"".to_string()),
        Just(" title='".to_string()),
        Just("<style>".to_string()),
        Just("</style>".to_string()),
        Just("<!--".to_string()),
        Just("-->".to_string()),
        Just("<div".to_string()),
        Just("<a".to_string()),
        Just("<svg viewBox=\"0 0 1 1\">".to_string()),
        Just("</svg>".to_string()),
        Just(">".to_string()),
        Just("<".to_string()),
        "[a-z ]{0,8}",
    ]
}

// Attribute runs with balanced quotes, some hiding `>` or `/`
fn arb_attributes() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just(" alt=\">\"".to_string()),
            Just(" title='a>b'".to_string()),
            Just("/".to_string()),
            Just(" src=x".to_string()),
            Just(" data-x=\"/>\"".to_string()),
            "[a-z ]{0,6}",
        ],
        0..6,
    )
    .prop_map(|parts| parts.concat())
}

fn arb_markup() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..24).prop_map(|parts| parts.concat())
}

proptest! {
    /// Property: sanitizing HTML twice equals sanitizing once
    #[test]
    fn prop_html_sanitize_idempotent(input in arb_markup()) {
        let s = sanitizer();
        let once = s.sanitize(&input, ArtifactType::Html).unwrap();
        let twice = s.sanitize(&once, ArtifactType::Html).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: sanitizing SVG twice equals sanitizing once
    #[test]
    fn prop_svg_sanitize_idempotent(input in arb_markup()) {
        let s = sanitizer();
        let once = s.sanitize(&input, ArtifactType::Svg).unwrap();
        let twice = s.sanitize(&once, ArtifactType::Svg).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: sanitized HTML never contains a script opening tag
    #[test]
    fn prop_html_has_no_script_tag(input in arb_markup()) {
        let out = sanitizer().sanitize(&input, ArtifactType::Html).unwrap();
        let script_tag = Regex::new(r"(?i)<script\b").unwrap();
        prop_assert!(!script_tag.is_match(&out));
    }

    /// Property: a handler survives no attribute run placed before it
    #[test]
    fn prop_handler_after_attributes_removed(attrs in arb_attributes()) {
        let input = format!("<img{attrs} onerror=\"alert(1)\">");
        let out = sanitizer().sanitize(&input, ArtifactType::Html).unwrap();
        prop_assert!(!out.contains("onerror"), "{} -> {}", input, out);
    }

    /// Property: a script URL survives no attribute run placed before it
    #[test]
    fn prop_script_url_after_attributes_neutralized(attrs in arb_attributes()) {
        let input = format!("<a{attrs} href=java&#x73;cript:alert(1)>x</a>");
        let out = sanitizer().sanitize(&input, ArtifactType::Html).unwrap();
        prop_assert!(!out.contains("cript:"), "{} -> {}", input, out);
    }

    /// Property: sanitizing never grows the content
    #[test]
    fn prop_sanitize_never_grows(input in arb_markup()) {
        let out = sanitizer().sanitize(&input, ArtifactType::Html).unwrap();
        prop_assert!(out.len() <= input.len());
    }

    /// Property: display-only types pass through unchanged
    #[test]
    fn prop_display_types_untouched(input in ".{0,200}") {
        let s = sanitizer();
        prop_assert_eq!(s.sanitize(&input, ArtifactType::Code).unwrap(), input.clone());
        prop_assert_eq!(s.sanitize(&input, ArtifactType::Markdown).unwrap(), input);
    }
}

#[test]
fn test_reassembled_script_removed() {
    let s = sanitizer();
    let out = s
        .sanitize("<scr<script>x</script>ipt>alert(1)</script>", ArtifactType::Html)
        .unwrap();
    assert!(!Regex::new(r"(?i)<script\b").unwrap().is_match(&out));
    assert_eq!(s.sanitize(&out, ArtifactType::Html).unwrap(), out);
}
