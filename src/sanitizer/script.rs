//! Forbidden-construct scanning for executable component code
//!
//! Component source is never rewritten: if any forbidden construct appears
//! the whole component is rejected. Matching is purely lexical, so a match
//! inside a comment or string literal still rejects.

use super::RiskCategory;
use crate::config::ForbiddenPattern;
use crate::error::{Error, Result};
use regex::Regex;

/// A forbidden construct found in component source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptViolation {
    /// Rule name from the pattern table
    pub rule: String,
    /// Risk category of the rule
    pub category: RiskCategory,
    /// Text that matched
    pub matched: String,
    /// Byte offset of the match
    pub position: usize,
}

#[derive(Debug)]
struct CompiledRule {
    name: String,
    category: RiskCategory,
    regex: Regex,
}

/// Scanner over a table of forbidden patterns
#[derive(Debug)]
pub struct ScriptScanner {
    rules: Vec<CompiledRule>,
}

impl ScriptScanner {
    /// Compile a forbidden-pattern table.
    pub fn new(patterns: &[ForbiddenPattern]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| {
                let regex = Regex::new(&p.pattern).map_err(|e| {
                    Error::Config(format!("Invalid forbidden pattern '{}': {}", p.name, e))
                })?;
                Ok(CompiledRule {
                    name: p.name.clone(),
                    category: p.category,
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// All violations, in rule-table order then position.
    pub fn scan(&self, code: &str) -> Vec<ScriptViolation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            for m in rule.regex.find_iter(code) {
                violations.push(ScriptViolation {
                    rule: rule.name.clone(),
                    category: rule.category,
                    matched: m.as_str().trim().to_string(),
                    position: m.start(),
                });
            }
        }
        violations
    }

    /// Reject the code on the first violation.
    pub fn check(&self, code: &str) -> Result<()> {
        match self.scan(code).into_iter().next() {
            Some(v) => Err(Error::SanitizationRejected {
                category: v.category,
                pattern: v.matched,
            }),
            None => Ok(()),
        }
    }

    /// Number of compiled rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
