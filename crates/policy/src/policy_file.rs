use crate::safety::Severity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SafetyPolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid pattern '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Danger pattern as written in a policy file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternRule {
    pub name: String,
    /// Regex matched against lowercased, whitespace-collapsed command text.
    pub pattern: String,
    pub severity: Severity,
}

impl PatternRule {
    pub fn new(name: &str, pattern: &str, severity: Severity) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            severity,
        }
    }
}

/// User-supplied danger policy, stored as YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Keep the built-in rules and append `patterns` after them.
    #[serde(default = "default_extend")]
    pub extend_defaults: bool,
    #[serde(default)]
    pub patterns: Vec<PatternRule>,
}

fn default_extend() -> bool {
    true
}

impl SafetyPolicy {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, SafetyPolicyError> {
        let content = tokio::fs::read_to_string(&path).await?;
        let policy: SafetyPolicy = serde_yaml::from_str(&content)?;
        Ok(policy)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SafetyPolicyError> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Effective rule list in evaluation order.
    pub fn rules(&self) -> Vec<PatternRule> {
        let mut rules = if self.extend_defaults {
            default_rules()
        } else {
            Vec::new()
        };
        rules.extend(self.patterns.iter().cloned());
        rules
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            extend_defaults: true,
            patterns: Vec::new(),
        }
    }
}

pub fn default_rules() -> Vec<PatternRule> {
    use Severity::{Block, Confirm};

    vec![
        // Block tier
        PatternRule::new(
            "recursive delete of a root-level path",
            r"\brm\s+(?:-{1,2}[\w-]+\s+)*-(?:[a-z]*r[a-z]*|-recursive)\s+(?:-{1,2}[\w-]+\s+)*(?:/|/\*|~/?\*?|\$home/?\*?)(?:\s|$|[;&|])",
            Block,
        ),
        PatternRule::new(
            "recursive delete of a drive root",
            r#"\b(?:rd|rmdir|del|remove-item)\b.*\s['"]?[a-z]:\\?\*?['"]?(?:\s|$)"#,
            Block,
        ),
        PatternRule::new("filesystem format", r"\bmkfs(?:\.\w+)?\b|\bformat(?:-volume)?\s+[a-z]:", Block),
        PatternRule::new(
            "raw write to a block device",
            r"\bdd\b.*\bof=/dev/(?:sd|hd|nvme|vd|xvd|mmcblk|disk)|>\s*/dev/(?:sd|hd|nvme|vd|xvd|mmcblk|disk)",
            Block,
        ),
        PatternRule::new("disk wipe", r"\bshred\b.*\s/dev/", Block),
        PatternRule::new(
            "fork bomb",
            r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
            Block,
        ),
        PatternRule::new(
            "world-writable root",
            r"\bchmod\s+(?:-[a-z]+\s+)*-[a-z]*r[a-z]*\s+(?:0?777|a\+rwx)\s+/(?:\s|$)",
            Block,
        ),
        // Confirm tier
        PatternRule::new(
            "recursive delete",
            r"\brm\s+(?:-{1,2}[\w-]+\s+)*-(?:[a-z]*r[a-z]*|-recursive)\b",
            Confirm,
        ),
        PatternRule::new(
            "recursive delete (windows)",
            r"\b(?:rd|rmdir|del)\b.*\s/s\b|\bremove-item\b.*-recurse\b",
            Confirm,
        ),
        PatternRule::new(
            "remote script piped to an interpreter",
            r"\b(?:curl|wget|iwr|invoke-webrequest)\b.*\|\s*(?:sudo\s+)?(?:sh|bash|zsh|python[0-9.]*|perl|ruby|node|iex|invoke-expression)\b",
            Confirm,
        ),
        PatternRule::new(
            "power state change",
            r"\b(?:shutdown|reboot|halt|poweroff|stop-computer|restart-computer)\b|\binit\s+[06]\b",
            Confirm,
        ),
        PatternRule::new("privilege escalation", r"\b(?:sudo|doas|runas)\b", Confirm),
        PatternRule::new("partition table edit", r"\b(?:fdisk|parted|diskpart|wipefs)\b", Confirm),
        PatternRule::new("force push", r"\bgit\s+push\b.*(?:--force\b|\s-f\b)", Confirm),
        PatternRule::new("mass process kill", r"\bkill\s+-9\s+-1\b|\bkillall\b|\bpkill\b", Confirm),
        PatternRule::new(
            "recursive ownership change",
            r"\bchown\s+(?:-[a-z]+\s+)*-[a-z]*r",
            Confirm,
        ),
    ]
}
