use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use trimstream_core::{AppError, AppResult, PurgeRunId};

use crate::purge_ports::{
    ChunkDeleteClient, ChunkDeleteRequest, PurgeCatalog, PurgeInvocation, PurgeReport, PurgeStatus,
};

mod pacing;
mod progress;
mod round;
mod validation;

use pacing::PaceScheduler;
use progress::{ProgressSnapshot, ProgressState};
use round::RoundExecutor;

/// Longest time a single round waits for the chunk client to reply.
pub const DEFAULT_ROUND_WAIT_CEILING: Duration = Duration::from_secs(60);

/// Chunked purge-and-export orchestrator.
///
/// Round 1 runs on the caller's task. When rows remain, the remaining rounds are
/// spread over the pacing interval by a background clock and the call waits for
/// them, bounded by the invocation timeout.
#[derive(Clone)]
pub struct PurgeService {
    catalog: Arc<dyn PurgeCatalog>,
    chunk_client: Arc<dyn ChunkDeleteClient>,
    round_wait_ceiling: Duration,
}

impl PurgeService {
    /// Creates a purge service.
    #[must_use]
    pub fn new(catalog: Arc<dyn PurgeCatalog>, chunk_client: Arc<dyn ChunkDeleteClient>) -> Self {
        Self {
            catalog,
            chunk_client,
            round_wait_ceiling: DEFAULT_ROUND_WAIT_CEILING,
        }
    }

    /// Overrides how long one round waits for the chunk client.
    #[must_use]
    pub fn with_round_wait_ceiling(mut self, round_wait_ceiling: Duration) -> Self {
        self.round_wait_ceiling = round_wait_ceiling;
        self
    }

    /// Runs one purge invocation and returns its result row.
    ///
    /// Validation failures and a first round that removes nothing while rows
    /// still match are returned as errors. Round failures and the timeout are
    /// reported through [`PurgeReport::status`] and [`PurgeReport::message`].
    pub async fn purge(&self, invocation: PurgeInvocation) -> AppResult<PurgeReport> {
        let run_id = PurgeRunId::new();
        let request = self.resolve_request(&invocation).await?;
        let replicated = request.is_replicated();

        info!(
            %run_id,
            table = %request.table_name(),
            stream = %request.stream_name(),
            predicate = %request.predicate(),
            chunk_size = request.chunk_size(),
            max_rounds = request.max_rounds(),
            replicated,
            "purge started"
        );

        let chunk_request = Arc::new(ChunkDeleteRequest::from_purge_request(&request));
        let executor = RoundExecutor::new(self.chunk_client.clone(), self.round_wait_ceiling);
        let progress = Arc::new(ProgressState::default());

        let first_round = executor.run_round(&chunk_request, replicated, 1).await;
        progress.record_first_round(&first_round).await;

        if !first_round.is_success() {
            return Ok(finish(run_id, progress.finalize().await));
        }

        if first_round.rows_exported == 0 && first_round.rows_remaining > 0 {
            warn!(
                %run_id,
                table = %request.table_name(),
                rows_remaining = first_round.rows_remaining,
                "purge removed no rows in its first round"
            );
            return Err(AppError::ProgressStalled(format!(
                "first round on table '{}' removed no rows while {} rows still match '{}'",
                request.table_name(),
                first_round.rows_remaining,
                request.predicate()
            )));
        }

        let attempts_left = PaceScheduler::attempts_left(
            first_round.rows_remaining,
            request.chunk_size(),
            request.max_rounds(),
        );
        if attempts_left == 0 {
            return Ok(finish(run_id, progress.finalize().await));
        }

        let plan = PaceScheduler::plan(attempts_left, request.pacing_interval());
        progress.begin_scheduled_phase().await;

        let scheduler = PaceScheduler::new();
        scheduler.start(plan, executor, chunk_request, replicated, progress.clone());

        let timeout = request.timeout();
        if !scheduler.wait(timeout).await {
            scheduler.cancel();
            let timeout_ms = timeout.as_millis();
            warn!(
                %run_id,
                table = %request.table_name(),
                timeout_ms = u64::try_from(timeout_ms).unwrap_or(u64::MAX),
                "purge timed out before every scheduled round completed"
            );
            progress
                .record_timeout(format!(
                    "timed out after {timeout_ms} ms waiting for scheduled rounds"
                ))
                .await;
        }

        Ok(finish(run_id, progress.finalize().await))
    }
}

fn finish(run_id: PurgeRunId, snapshot: ProgressSnapshot) -> PurgeReport {
    let status = if snapshot.success {
        PurgeStatus::Success
    } else {
        PurgeStatus::GracefulFailure
    };
    let message = if snapshot.success {
        String::new()
    } else {
        snapshot.message()
    };

    info!(
        %run_id,
        rows_exported = snapshot.total_rows_exported,
        rows_left = snapshot.rows_remaining,
        status = status.as_str(),
        "purge finished"
    );

    PurgeReport {
        rows_exported: snapshot.total_rows_exported,
        rows_left: snapshot.rows_remaining,
        exported_last_round: snapshot.rows_exported_last_round,
        last_export_timestamp: Utc::now().timestamp_millis(),
        status,
        message,
    }
}
