use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Knobs for one controller instance. Passed in at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Treat `RequireConfirmation` as `Allow` and never prompt.
    pub auto_execute: bool,
    /// When false the safety classifier is skipped entirely.
    pub safe_mode: bool,
    /// Re-translations after the first failed execution.
    pub max_retries: u32,
    pub execution_timeout: Duration,
    /// Extra translation calls after a failed one, separate from `max_retries`.
    pub transport_retries: u32,
    pub transport_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_execute: false,
            safe_mode: true,
            max_retries: 3,
            execution_timeout: Duration::from_secs(60),
            transport_retries: 2,
            transport_backoff: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.execution_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "execution_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on executions for one request.
    pub fn execution_budget(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
