use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exit code recorded when the engine kills a command at its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;
/// Exit code recorded when the interpreter could not be started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;
/// Exit code recorded when the process ended by signal without a status.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Immutable snapshot of one execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn timed_out(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout,
            stderr,
            duration,
            timed_out: true,
        }
    }

    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: message.into(),
            duration: Duration::ZERO,
            timed_out: false,
        }
    }
}
