//! Content classifier
//!
//! Decides whether assistant output deserves artifact treatment and of what
//! kind. The decision is score-based: each signal found in the user's request
//! (or in the content's size) contributes a fixed weight, and content becomes
//! an artifact once the total reaches the threshold. Type detection is a
//! separate ordered match over the content itself (see [`detect`]).
//!
//! Classification is deterministic: no randomness, no I/O.

pub mod detect;

pub use detect::{ContentDetector, TypeDetection};

use crate::artifact::ArtifactType;
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A scoring signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Content exceeds the line or character threshold
    LongContent,
    /// User asked for something interactive
    Interactive,
    /// User asked for something visual
    Visual,
    /// User mentioned code structure
    Code,
    /// User used a build verb
    BuildIntent,
    /// User asked to change earlier output
    Iterative,
}

/// Keyword patterns matched against the user's request only
const INTENT_PATTERNS: &[(Signal, &str)] = &[
    (
        Signal::Interactive,
        r"(?i)\b(?:button|click|hover|input|form|game|chart|graph|interactive)\b",
    ),
    (
        Signal::Visual,
        r"(?i)\b(?:visualize|chart|graph|diagram|plot|draw|design|create|build)\b",
    ),
    (
        Signal::Code,
        r"(?i)\b(?:function|class|component|script|program|algorithm|code)\b",
    ),
    (
        Signal::BuildIntent,
        r"(?i)\b(?:build|create|make|develop|design|generate)\b",
    ),
    (
        Signal::Iterative,
        r"(?i)\b(?:modify|update|change|improve|fix|enhance)\b",
    ),
];

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Whether the content should become an artifact
    pub create: bool,
    /// Sum of triggered signal weights
    pub score: u32,
    /// Signals that fired
    pub signals: Vec<Signal>,
    /// Detected type
    pub artifact_type: ArtifactType,
    /// Detected language for code
    pub language: Option<String>,
    /// Type fell back to the default
    pub ambiguous: bool,
}

/// Score-based artifact classifier
#[derive(Debug)]
pub struct Classifier {
    config: ClassifierConfig,
    intents: Vec<(Signal, Regex)>,
    detector: ContentDetector,
}

impl Classifier {
    /// Create a classifier with the given scoring configuration
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let intents = INTENT_PATTERNS
            .iter()
            .map(|(signal, pattern)| {
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::Config(format!("Invalid intent pattern for {:?}: {}", signal, e))
                })?;
                Ok((*signal, regex))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            intents,
            detector: ContentDetector::new()?,
        })
    }

    /// Classify content produced in response to `user_intent`.
    pub fn classify(&self, content: &str, user_intent: &str) -> Classification {
        let (score, signals) = self.score(content, user_intent);
        let detection = self.detector.detect_type(content);
        let create = score >= self.config.threshold;

        tracing::debug!(
            score,
            threshold = self.config.threshold,
            create,
            artifact_type = %detection.artifact_type,
            ambiguous = detection.ambiguous,
            "Classified content"
        );

        Classification {
            create,
            score,
            signals,
            artifact_type: detection.artifact_type,
            language: detection.language,
            ambiguous: detection.ambiguous,
        }
    }

    /// Whether content warrants becoming an artifact
    pub fn should_create(&self, content: &str, user_intent: &str) -> bool {
        self.score(content, user_intent).0 >= self.config.threshold
    }

    /// Detect type and language without scoring
    pub fn detect_type(&self, content: &str) -> TypeDetection {
        self.detector.detect_type(content)
    }

    /// Detect the programming language of source text
    pub fn detect_language(&self, content: &str) -> Option<&'static str> {
        self.detector.detect_language(content)
    }

    fn score(&self, content: &str, user_intent: &str) -> (u32, Vec<Signal>) {
        let mut signals = Vec::new();

        let lines = content.lines().count();
        let chars = content.chars().count();
        if lines > self.config.long_content_lines || chars > self.config.long_content_chars {
            signals.push(Signal::LongContent);
        }

        for (signal, pattern) in &self.intents {
            if pattern.is_match(user_intent) {
                signals.push(*signal);
            }
        }

        let score = signals.iter().map(|s| self.weight(*s)).sum();
        (score, signals)
    }

    fn weight(&self, signal: Signal) -> u32 {
        let w = &self.config.weights;
        match signal {
            Signal::LongContent => w.long_content,
            Signal::Interactive => w.interactive,
            Signal::Visual => w.visual,
            Signal::Code => w.code,
            Signal::BuildIntent => w.build_intent,
            Signal::Iterative => w.iterative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn test_plain_sentence_not_created() {
        let c = classifier();
        let content = "The weather was pleasant today.\nWe walked along the river.\nThen we went home.";
        let result = c.classify(content, "How was your day?");

        assert!(!result.create);
        assert_eq!(result.score, 0);
        assert!(result.signals.is_empty());
    }

    #[test]
    fn test_html_with_build_intent() {
        let c = classifier();
        let result = c.classify("<html><body>hi</body></html>", "Build me a landing page");

        assert!(result.create);
        assert_eq!(result.artifact_type, ArtifactType::Html);
        assert!(result.signals.contains(&Signal::BuildIntent));
    }

    #[test]
    fn test_interactive_request_alone_reaches_threshold() {
        let c = classifier();
        let result = c.classify("x", "Add a button");
        assert!(result.create);
        assert_eq!(result.score, 4);
        assert_eq!(result.signals, vec![Signal::Interactive]);
    }

    #[test]
    fn test_keywords_in_content_do_not_count() {
        let c = classifier();
        let result = c.classify("create a button chart game", "thanks");
        assert!(!result.create);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_long_content_signal() {
        let c = classifier();
        let content = (0..20).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let result = c.classify(&content, "explain loops");

        assert!(result.signals.contains(&Signal::LongContent));
        assert_eq!(result.score, 3);
        assert!(!result.create);

        // Long content plus a code mention crosses the threshold
        assert!(c.should_create(&content, "show me the code"));
    }

    #[test]
    fn test_long_content_by_chars() {
        let c = classifier();
        let content = "a".repeat(801);
        let (score, signals) = c.score(&content, "");
        assert_eq!(score, 3);
        assert_eq!(signals, vec![Signal::LongContent]);
    }

    #[test]
    fn test_iterative_signal_weight() {
        let c = classifier();
        let (score, signals) = c.score("x", "please fix it");
        assert_eq!(score, 1);
        assert_eq!(signals, vec![Signal::Iterative]);
    }

    #[test]
    fn test_custom_threshold() {
        let config = ClassifierConfig {
            threshold: 10,
            ..Default::default()
        };
        let c = Classifier::new(config).unwrap();
        assert!(!c.should_create("x", "Build an interactive chart"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let a = c.classify("def f():\n    pass", "write a python function");
        let b = c.classify("def f():\n    pass", "write a python function");
        assert_eq!(a, b);
        assert_eq!(a.artifact_type, ArtifactType::Code);
        assert_eq!(a.language.as_deref(), Some("python"));
    }

    #[test]
    fn test_ambiguous_fallback() {
        let c = classifier();
        let result = c.classify("hello there", "create something");
        assert_eq!(result.artifact_type, ArtifactType::Markdown);
        assert!(result.ambiguous);
    }
}
