use crate::config::{EngineConfig, EngineError};
use crate::metrics::Metrics;
use crate::runner::CommandRunner;
use crate::search::search_url;
use bashai_executor::ExecutionError;
use bashai_interfaces::Confirmer;
use bashai_policy::SafetyClassifier;
use bashai_protocol::{CommandCandidate, ExecutionResult, Request, SafetyVerdict, Transcript};
use bashai_providers::{TranslationError, Translator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Translating,
    Classifying,
    Confirming,
    Executing,
    Evaluating,
    Retrying,
    Succeeded,
    Exhausted,
    Blocked,
    Aborted,
}

impl ControllerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Exhausted | Self::Blocked | Self::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translating => "translating",
            Self::Classifying => "classifying",
            Self::Confirming => "confirming",
            Self::Executing => "executing",
            Self::Evaluating => "evaluating",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::Blocked => "blocked",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one request, handed to the display layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub request: Request,
    /// Always a terminal state.
    pub state: ControllerState,
    pub reason: Option<String>,
    pub transcript: Transcript,
    /// Only set when the request is exhausted.
    pub search_url: Option<String>,
}

impl RunReport {
    pub fn executions(&self) -> usize {
        self.transcript.executed_count()
    }
}

enum TranslateOutcome {
    Candidate(CommandCandidate),
    Failed(TranslationError),
    Cancelled,
}

/// Drives one request through translate, classify, confirm, execute and
/// evaluate until a terminal state is reached.
pub struct SelfHealController {
    config: EngineConfig,
    translator: Arc<dyn Translator>,
    classifier: SafetyClassifier,
    runner: Arc<dyn CommandRunner>,
    confirmer: Arc<dyn Confirmer>,
    metrics: Arc<Metrics>,
}

impl SelfHealController {
    pub fn new(
        config: EngineConfig,
        translator: Arc<dyn Translator>,
        classifier: SafetyClassifier,
        runner: Arc<dyn CommandRunner>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            translator,
            classifier,
            runner,
            confirmer,
            metrics: Metrics::new(),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn run(&self, request: Request, cancel: &CancellationToken) -> RunReport {
        info!("Handling request: {}", request.raw_text);
        let mut transcript = Transcript::new();
        let budget = self.config.execution_budget();

        loop {
            debug!("state={} attempt={}", ControllerState::Translating, transcript.next_attempt_number());
            let candidate = match self.translate(&request, &transcript, cancel).await {
                TranslateOutcome::Candidate(candidate) => candidate,
                TranslateOutcome::Cancelled => {
                    return self.finish(
                        ControllerState::Aborted,
                        Some("cancelled while waiting for translation".to_string()),
                        request,
                        transcript,
                    );
                }
                TranslateOutcome::Failed(e) => {
                    return self.finish(
                        ControllerState::Exhausted,
                        Some(format!("translation failed: {}", e)),
                        request,
                        transcript,
                    );
                }
            };

            let repeats_last = transcript
                .last()
                .is_some_and(|previous| previous.candidate.same_command(&candidate));
            if !repeats_last && transcript.has_failed(&candidate) {
                warn!("Translator returned an earlier failing command: {}", candidate.summary());
                return self.finish(
                    ControllerState::Exhausted,
                    Some("translator repeated a previous failing command".to_string()),
                    request,
                    transcript,
                );
            }

            debug!("state={} candidate={}", ControllerState::Classifying, candidate.summary());
            let verdict = if self.config.safe_mode {
                self.classifier.classify(&candidate)
            } else {
                SafetyVerdict::Allow
            };

            match &verdict {
                SafetyVerdict::Block { reason } => {
                    warn!("Blocked {}: {}", candidate.summary(), reason);
                    self.metrics.inc_blocks();
                    let reason = reason.clone();
                    transcript.record(candidate, verdict, None);
                    return self.finish(ControllerState::Blocked, Some(reason), request, transcript);
                }
                SafetyVerdict::RequireConfirmation { reason } if !self.config.auto_execute => {
                    debug!("state={}", ControllerState::Confirming);
                    let question = format!("Run `{}`? ({})", candidate.summary(), reason);
                    let approved = tokio::select! {
                        _ = cancel.cancelled() => None,
                        answer = self.confirmer.ask(&question) => Some(answer),
                    };
                    if approved != Some(true) {
                        let reason = match approved {
                            None => "cancelled while waiting for confirmation",
                            Some(_) => "declined by user",
                        };
                        transcript.record(candidate, verdict, None);
                        return self.finish(
                            ControllerState::Aborted,
                            Some(reason.to_string()),
                            request,
                            transcript,
                        );
                    }
                }
                SafetyVerdict::RequireConfirmation { reason } => {
                    info!("Auto-executing despite warning: {}", reason);
                }
                SafetyVerdict::Allow => {}
            }

            debug!("state={}", ControllerState::Executing);
            self.metrics.inc_executions();
            let result = match self
                .runner
                .run(&candidate, self.config.execution_timeout, cancel)
                .await
            {
                Ok(result) => result,
                Err(ExecutionError::TimeoutExceeded { timeout, result }) => {
                    warn!("Command timed out after {:?}", timeout);
                    result
                }
                Err(ExecutionError::SpawnFailed(msg)) => {
                    warn!("Command failed to start: {}", msg);
                    ExecutionResult::spawn_failure(msg)
                }
                Err(ExecutionError::Cancelled) => {
                    transcript.record(candidate, verdict, None);
                    return self.finish(
                        ControllerState::Aborted,
                        Some("cancelled while the command was running".to_string()),
                        request,
                        transcript,
                    );
                }
            };

            debug!("state={} exit_code={}", ControllerState::Evaluating, result.exit_code);
            let (succeeded, attempt_number) = {
                let attempt = transcript.record(candidate, verdict, Some(result));
                (attempt.succeeded(), attempt.attempt_number)
            };
            if succeeded {
                return self.finish(ControllerState::Succeeded, None, request, transcript);
            }
            self.metrics.inc_execution_failures();

            if repeats_last {
                return self.finish(
                    ControllerState::Exhausted,
                    Some("translator repeated the previous failing command".to_string()),
                    request,
                    transcript,
                );
            }
            if attempt_number >= budget {
                return self.finish(
                    ControllerState::Exhausted,
                    Some(format!("all {} attempts failed", budget)),
                    request,
                    transcript,
                );
            }
            if cancel.is_cancelled() {
                return self.finish(
                    ControllerState::Aborted,
                    Some("cancelled before retrying".to_string()),
                    request,
                    transcript,
                );
            }

            info!(
                "state={} attempt {} of {} failed",
                ControllerState::Retrying,
                attempt_number,
                budget
            );
        }
    }

    /// One translation with its own transport retries, separate from the
    /// command retry budget.
    async fn translate(
        &self,
        request: &Request,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> TranslateOutcome {
        let mut tries = 0;
        loop {
            self.metrics.inc_translations();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return TranslateOutcome::Cancelled,
                outcome = self.translator.translate(request, transcript) => outcome,
            };

            let err = match outcome {
                Ok(candidate) => return TranslateOutcome::Candidate(candidate),
                Err(e) => e,
            };
            self.metrics.inc_translation_failures();
            if tries >= self.config.transport_retries {
                warn!("Giving up on translation after {} tries: {}", tries + 1, err);
                return TranslateOutcome::Failed(err);
            }
            tries += 1;

            let delay = if err.is_transport() {
                self.config.transport_backoff * tries
            } else {
                std::time::Duration::ZERO
            };
            warn!("Translation failed ({}), retrying in {:?}", err, delay);
            tokio::select! {
                _ = cancel.cancelled() => return TranslateOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn finish(
        &self,
        state: ControllerState,
        reason: Option<String>,
        request: Request,
        transcript: Transcript,
    ) -> RunReport {
        if state == ControllerState::Aborted {
            self.metrics.inc_aborts();
        }
        let search_url = (state == ControllerState::Exhausted)
            .then(|| search_url(transcript.last_stderr(), &request.raw_text));

        info!(
            "Request finished: state={} attempts={} reason={}",
            state,
            transcript.len(),
            reason.as_deref().unwrap_or("-")
        );

        RunReport {
            request,
            state,
            reason,
            transcript,
            search_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal = [
            ControllerState::Succeeded,
            ControllerState::Exhausted,
            ControllerState::Blocked,
            ControllerState::Aborted,
        ];
        for state in terminal {
            assert!(state.is_terminal(), "{state} should be terminal");
        }
        assert!(!ControllerState::Translating.is_terminal());
        assert!(!ControllerState::Retrying.is_terminal());
        assert_eq!(ControllerState::Exhausted.to_string(), "exhausted");
    }
}
