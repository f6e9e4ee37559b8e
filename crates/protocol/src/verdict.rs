use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the textual safety check on a candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum SafetyVerdict {
    Allow,
    RequireConfirmation { reason: String },
    Block { reason: String },
}

impl SafetyVerdict {
    pub fn reason(&self) -> Option<&str> {
        match self {
            SafetyVerdict::Allow => None,
            SafetyVerdict::RequireConfirmation { reason } | SafetyVerdict::Block { reason } => {
                Some(reason)
            }
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, SafetyVerdict::Block { .. })
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyVerdict::Allow => f.write_str("allow"),
            SafetyVerdict::RequireConfirmation { reason } => write!(f, "confirm ({})", reason),
            SafetyVerdict::Block { reason } => write!(f, "block ({})", reason),
        }
    }
}
