use async_trait::async_trait;
use bashai_executor::{ExecutionEngine, ExecutionError};
use bashai_protocol::{CommandCandidate, ExecutionResult};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executes an approved candidate. Implemented by [`ExecutionEngine`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        candidate: &CommandCandidate,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError>;
}

#[async_trait]
impl CommandRunner for ExecutionEngine {
    async fn run(
        &self,
        candidate: &CommandCandidate,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.execute_with_cancel(candidate, timeout, cancel).await
    }
}
