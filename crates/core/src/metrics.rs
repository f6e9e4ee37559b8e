use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct Metrics {
    translations: AtomicU64,
    translation_failures: AtomicU64,
    executions: AtomicU64,
    execution_failures: AtomicU64,
    blocks: AtomicU64,
    aborts: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_translations(&self) {
        self.translations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_translation_failures(&self) {
        self.translation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_executions(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_execution_failures(&self) {
        self.execution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_blocks(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_aborts(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            translations: self.translations.load(Ordering::Relaxed),
            translation_failures: self.translation_failures.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub translations: u64,
    pub translation_failures: u64,
    pub executions: u64,
    pub execution_failures: u64,
    pub blocks: u64,
    pub aborts: u64,
}

impl MetricsSnapshot {
    pub fn translation_success_rate(&self) -> f64 {
        if self.translations == 0 {
            return 1.0;
        }
        1.0 - (self.translation_failures as f64 / self.translations as f64)
    }

    pub fn execution_success_rate(&self) -> f64 {
        if self.executions == 0 {
            return 1.0;
        }
        1.0 - (self.execution_failures as f64 / self.executions as f64)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "translations: {} ({} failed, {:.0}% ok)",
            self.translations,
            self.translation_failures,
            self.translation_success_rate() * 100.0
        )?;
        writeln!(
            f,
            "executions:   {} ({} failed, {:.0}% ok)",
            self.executions,
            self.execution_failures,
            self.execution_success_rate() * 100.0
        )?;
        write!(f, "blocked: {}  aborted: {}", self.blocks, self.aborts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_rates() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().execution_success_rate(), 1.0);

        metrics.inc_translations();
        metrics.inc_translations();
        metrics.inc_translation_failures();
        for _ in 0..4 {
            metrics.inc_executions();
        }
        metrics.inc_execution_failures();
        metrics.inc_blocks();

        let snap = metrics.snapshot();
        assert_eq!(snap.translations, 2);
        assert_eq!(snap.translation_success_rate(), 0.5);
        assert_eq!(snap.execution_success_rate(), 0.75);
        assert_eq!(snap.blocks, 1);
        assert_eq!(snap.aborts, 0);
        assert!(snap.to_string().contains("executions:   4 (1 failed, 75% ok)"));
    }
}
