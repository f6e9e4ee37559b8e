use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateKind {
    Shell,
    FileGeneration { file_name: String },
}

/// One proposed command or file payload. Superseded on retry, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandCandidate {
    /// Command line for `Shell`, file contents for `FileGeneration`.
    pub text: String,
    pub kind: CandidateKind,
    pub origin_attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl CommandCandidate {
    pub fn shell(text: impl Into<String>, origin_attempt: u32) -> Self {
        Self {
            text: text.into(),
            kind: CandidateKind::Shell,
            origin_attempt,
            explanation: None,
        }
    }

    pub fn file(file_name: impl Into<String>, contents: impl Into<String>, origin_attempt: u32) -> Self {
        Self {
            text: contents.into(),
            kind: CandidateKind::FileGeneration {
                file_name: file_name.into(),
            },
            origin_attempt,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        if !explanation.trim().is_empty() {
            self.explanation = Some(explanation);
        }
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        match &self.kind {
            CandidateKind::FileGeneration { file_name } => Some(file_name),
            CandidateKind::Shell => None,
        }
    }

    /// Same command payload, ignoring which attempt produced it.
    pub fn same_command(&self, other: &CommandCandidate) -> bool {
        self.kind == other.kind && self.text == other.text
    }

    /// Single-line label for prompts and transcripts.
    pub fn summary(&self) -> String {
        match &self.kind {
            CandidateKind::Shell => self.text.clone(),
            CandidateKind::FileGeneration { file_name } => {
                format!("write file {} ({} bytes)", file_name, self.text.len())
            }
        }
    }
}
