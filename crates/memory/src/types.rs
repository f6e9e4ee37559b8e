use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finished request as remembered across sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub request: String,
    /// Candidate summaries in attempt order.
    pub commands: Vec<String>,
    /// Terminal state name, e.g. `succeeded` or `exhausted`.
    pub outcome: String,
}

impl HistoryEntry {
    pub fn new(request: impl Into<String>, commands: Vec<String>, outcome: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            request: request.into(),
            commands,
            outcome: outcome.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFile {
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}
