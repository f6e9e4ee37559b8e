use crate::config::AppConfig;
use crate::render;
use anyhow::{Context, Result};
use bashai_core::{ControllerState, Metrics, RunReport, SelfHealController};
use bashai_executor::ExecutionEngine;
use bashai_interfaces::{Confirmer, Interface, TerminalInterface};
use bashai_memory::{HistoryEntry, HistoryStore};
use bashai_policy::{SafetyClassifier, SafetyPolicy};
use bashai_protocol::{OsProfile, Request};
use bashai_providers::{HttpProvider, ModelTranslator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything needed to serve requests for one process lifetime.
pub struct Session {
    profile: OsProfile,
    controller: SelfHealController,
    history: HistoryStore,
    terminal: Arc<TerminalInterface>,
    metrics: Arc<Metrics>,
    open_search: bool,
}

impl Session {
    pub async fn build(config: &AppConfig, history: HistoryStore, open_search: bool) -> Result<Self> {
        let profile = bashai_executor::resolve();

        let classifier = match &config.policy_file {
            Some(path) => {
                let policy = SafetyPolicy::load(path)
                    .await
                    .with_context(|| format!("Failed to load safety policy {}", path.display()))?;
                SafetyClassifier::from_policy(&policy)?
            }
            None => SafetyClassifier::new(),
        };
        tracing::info!("Safety classifier loaded with {} patterns", classifier.pattern_count());

        let provider = HttpProvider::with_timeout(
            config.server_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
            config.request_timeout(),
        );
        let translator = ModelTranslator::new(Arc::new(provider), config.request_timeout());
        let engine = ExecutionEngine::new(profile.clone());
        let terminal = Arc::new(TerminalInterface::new());
        let metrics = Metrics::new();

        let controller = SelfHealController::new(
            config.engine_config(),
            Arc::new(translator),
            classifier,
            Arc::new(engine),
            terminal.clone(),
        )?
        .with_metrics(metrics.clone());

        Ok(Self {
            profile,
            controller,
            history,
            terminal,
            metrics,
            open_search,
        })
    }

    pub fn profile(&self) -> &OsProfile {
        &self.profile
    }

    pub fn terminal(&self) -> &Arc<TerminalInterface> {
        &self.terminal
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run one request to completion. Ctrl-C cancels the in-flight step,
    /// including a pending confirmation prompt; the next line typed goes to
    /// the interactive prompt, not to the abandoned question.
    pub async fn handle(&self, text: &str) -> RunReport {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, cancelling request");
                    cancel.cancel();
                }
            })
        };

        self.terminal
            .show_status(&format!("Translating: {}", text))
            .await;
        let report = self
            .controller
            .run(Request::new(text, self.profile.clone()), &cancel)
            .await;
        watcher.abort();

        self.terminal.send_output(&render::render_report(&report)).await;

        let entry = HistoryEntry::new(text, report.transcript.commands(), report.state.as_str());
        if let Err(e) = self.history.append(entry).await {
            tracing::warn!("Failed to save history: {}", e);
        }

        if report.state == ControllerState::Exhausted {
            self.offer_search(&report).await;
        }
        report
    }

    async fn offer_search(&self, report: &RunReport) {
        let Some(url) = &report.search_url else {
            return;
        };
        if !self.open_search || !self.terminal.ask("Open the search in your browser?").await {
            return;
        }
        if let Err(e) = open::that(url) {
            self.terminal
                .send_output(&render::ui_warn(&format!("Could not open browser: {}", e)))
                .await;
        }
    }
}
