//! Per-request attempt log.

use crate::candidate::CommandCandidate;
use crate::execution::ExecutionResult;
use crate::os::OsProfile;
use crate::verdict::SafetyVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single user turn. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub raw_text: String,
    pub os_profile: OsProfile,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn new(raw_text: impl Into<String>, os_profile: OsProfile) -> Self {
        Self {
            raw_text: raw_text.into(),
            os_profile,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub attempt_number: u32,
    pub candidate: CommandCandidate,
    pub verdict: SafetyVerdict,
    /// Absent when the candidate never reached the execution engine.
    pub result: Option<ExecutionResult>,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(ExecutionResult::success)
    }
}

/// Append-only record of attempts; attempt numbers start at 1 and increase by one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    attempts: Vec<Attempt>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_attempt_number(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    /// Append an attempt, numbering it after the current tail.
    pub fn record(
        &mut self,
        candidate: CommandCandidate,
        verdict: SafetyVerdict,
        result: Option<ExecutionResult>,
    ) -> &Attempt {
        let attempt_number = self.next_attempt_number();
        self.attempts.push(Attempt {
            attempt_number,
            candidate,
            verdict,
            result,
        });
        &self.attempts[self.attempts.len() - 1]
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Number of attempts that reached the execution engine.
    pub fn executed_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.result.is_some()).count()
    }

    pub fn last_stderr(&self) -> Option<&str> {
        self.attempts
            .iter()
            .rev()
            .filter_map(|a| a.result.as_ref())
            .map(|r| r.stderr.trim())
            .find(|s| !s.is_empty())
    }

    /// True when the same command already ran and failed in this request.
    pub fn has_failed(&self, candidate: &CommandCandidate) -> bool {
        self.attempts.iter().any(|a| {
            a.result.as_ref().is_some_and(|r| !r.success()) && a.candidate.same_command(candidate)
        })
    }

    pub fn commands(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.candidate.summary()).collect()
    }
}
