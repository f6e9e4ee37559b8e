//! Textual danger-pattern classifier.
//!
//! Matching is heuristic: it inspects the command text only and cannot see
//! aliases, variable expansion, or what a script does once it runs. A command
//! classified as `Allow` is not guaranteed to be harmless.

use crate::policy_file::{default_rules, PatternRule, SafetyPolicy, SafetyPolicyError};
use bashai_protocol::{CommandCandidate, SafetyVerdict};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Confirm,
    Block,
}

struct DangerPattern {
    name: String,
    regex: Regex,
    severity: Severity,
}

pub struct SafetyClassifier {
    patterns: Vec<DangerPattern>,
}

impl SafetyClassifier {
    /// Classifier with the built-in rule set.
    pub fn new() -> Self {
        let mut classifier = Self::empty();
        for rule in default_rules() {
            if let Err(e) = classifier.add_rule(&rule) {
                tracing::error!("Skipping built-in safety rule: {}", e);
            }
        }
        classifier
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn from_policy(policy: &SafetyPolicy) -> Result<Self, SafetyPolicyError> {
        let mut classifier = Self::empty();
        for rule in policy.rules() {
            classifier.add_rule(&rule)?;
        }
        tracing::debug!("Loaded {} safety patterns", classifier.patterns.len());
        Ok(classifier)
    }

    pub fn add_rule(&mut self, rule: &PatternRule) -> Result<(), SafetyPolicyError> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| SafetyPolicyError::InvalidPattern {
                name: rule.name.clone(),
                source,
            })?;
        self.patterns.push(DangerPattern {
            name: rule.name.clone(),
            regex,
            severity: rule.severity,
        });
        Ok(())
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn classify(&self, candidate: &CommandCandidate) -> SafetyVerdict {
        self.classify_text(&candidate.text)
    }

    /// Highest severity wins; among equals the earliest rule names the reason.
    pub fn classify_text(&self, text: &str) -> SafetyVerdict {
        let normalized = normalize(text);

        let mut worst: Option<&DangerPattern> = None;
        for pattern in &self.patterns {
            if !pattern.regex.is_match(&normalized) {
                continue;
            }
            if worst.map_or(true, |w| pattern.severity > w.severity) {
                worst = Some(pattern);
            }
        }

        match worst {
            None => SafetyVerdict::Allow,
            Some(p) => {
                let reason = format!("matched danger pattern: {}", p.name);
                match p.severity {
                    Severity::Block => SafetyVerdict::Block { reason },
                    Severity::Confirm => SafetyVerdict::RequireConfirmation { reason },
                }
            }
        }
    }
}

impl Default for SafetyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim, collapse whitespace runs to one space, lowercase.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
