use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphMetricsSnapshot {
    pub statements_executed: u64,
    pub tx_begin_count: u64,
    pub tx_commit_count: u64,
    pub tx_rollback_count: u64,
    pub savepoints_created: u64,
    pub busy_retries: u64,
    pub merges_created: u64,
    pub merges_matched: u64,
}

#[derive(Default)]
pub struct GraphMetrics {
    statements: AtomicU64,
    tx_begin: AtomicU64,
    tx_commit: AtomicU64,
    tx_rollback: AtomicU64,
    savepoints: AtomicU64,
    busy_retries: AtomicU64,
    merges_created: AtomicU64,
    merges_matched: AtomicU64,
}

impl GraphMetrics {
    pub fn snapshot(&self) -> GraphMetricsSnapshot {
        GraphMetricsSnapshot {
            statements_executed: self.statements.load(Ordering::Relaxed),
            tx_begin_count: self.tx_begin.load(Ordering::Relaxed),
            tx_commit_count: self.tx_commit.load(Ordering::Relaxed),
            tx_rollback_count: self.tx_rollback.load(Ordering::Relaxed),
            savepoints_created: self.savepoints.load(Ordering::Relaxed),
            busy_retries: self.busy_retries.load(Ordering::Relaxed),
            merges_created: self.merges_created.load(Ordering::Relaxed),
            merges_matched: self.merges_matched.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.statements,
            &self.tx_begin,
            &self.tx_commit,
            &self.tx_rollback,
            &self.savepoints,
            &self.busy_retries,
            &self.merges_created,
            &self.merges_matched,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tx_begin(&self) {
        self.tx_begin.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tx_commit(&self) {
        self.tx_commit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tx_rollback(&self) {
        self.tx_rollback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_savepoint(&self) {
        self.savepoints.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_busy_retry(&self) {
        self.busy_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self, created: bool) {
        if created {
            self.merges_created.fetch_add(1, Ordering::Relaxed);
        } else {
            self.merges_matched.fetch_add(1, Ordering::Relaxed);
        }
    }
}
