use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::purge_ports::RoundResult;

/// Shared accumulator updated by round 1 and every scheduled round.
#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    inner: Mutex<ProgressInner>,
}

#[derive(Debug)]
struct ProgressInner {
    total_rows_exported: i64,
    rows_remaining: i64,
    rows_exported_last_round: i64,
    round_errors: BTreeMap<u32, String>,
    success: bool,
    finalized: bool,
    timeout_message: Option<String>,
}

impl Default for ProgressInner {
    fn default() -> Self {
        Self {
            total_rows_exported: 0,
            rows_remaining: 0,
            rows_exported_last_round: 0,
            round_errors: BTreeMap::new(),
            success: true,
            finalized: false,
            timeout_message: None,
        }
    }
}

/// Sealed view of the progress once the invocation is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProgressSnapshot {
    pub(crate) total_rows_exported: i64,
    pub(crate) rows_remaining: i64,
    pub(crate) rows_exported_last_round: i64,
    pub(crate) success: bool,
    round_errors: BTreeMap<u32, String>,
    timeout_message: Option<String>,
}

impl ProgressSnapshot {
    /// Joins every recorded failure in round order, then the timeout entry.
    pub(crate) fn message(&self) -> String {
        self.round_errors
            .iter()
            .map(|(round, message)| format!("round {round}: {message}"))
            .chain(self.timeout_message.iter().cloned())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl ProgressState {
    pub(crate) async fn record_first_round(&self, result: &RoundResult) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }

        inner.rows_remaining = result.rows_remaining;
        inner.rows_exported_last_round = result.rows_exported;
        inner.apply(result);
    }

    /// Resets the latest-round fields before scheduled rounds start reporting.
    pub(crate) async fn begin_scheduled_phase(&self) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }

        inner.rows_remaining = 0;
        inner.rows_exported_last_round = 0;
    }

    /// Records a scheduled round; only the final attempt overwrites the latest-round fields.
    pub(crate) async fn record_scheduled_round(&self, is_final_attempt: bool, result: &RoundResult) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }

        if result.is_success() && is_final_attempt {
            inner.rows_remaining = result.rows_remaining;
            inner.rows_exported_last_round = result.rows_exported;
        }
        inner.apply(result);
    }

    pub(crate) async fn record_timeout(&self, message: String) {
        let mut inner = self.inner.lock().await;
        if inner.finalized {
            return;
        }

        inner.success = false;
        inner.timeout_message = Some(message);
    }

    /// Seals the state; later updates are ignored.
    pub(crate) async fn finalize(&self) -> ProgressSnapshot {
        let mut inner = self.inner.lock().await;
        inner.finalized = true;

        ProgressSnapshot {
            total_rows_exported: inner.total_rows_exported,
            rows_remaining: inner.rows_remaining,
            rows_exported_last_round: inner.rows_exported_last_round,
            success: inner.success,
            round_errors: inner.round_errors.clone(),
            timeout_message: inner.timeout_message.clone(),
        }
    }
}

impl ProgressInner {
    fn apply(&mut self, result: &RoundResult) {
        if result.is_success() {
            self.total_rows_exported = self
                .total_rows_exported
                .saturating_add(result.rows_exported);
        } else {
            self.success = false;
            self.round_errors
                .insert(result.round, result.error_message.clone());
        }
    }
}
