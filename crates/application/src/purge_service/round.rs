use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::purge_ports::{ChunkDeleteClient, ChunkDeleteRequest, ChunkOutcome, RoundResult};

/// Runs exactly one delete-and-export round and aggregates its outcomes.
#[derive(Clone)]
pub(crate) struct RoundExecutor {
    chunk_client: Arc<dyn ChunkDeleteClient>,
    wait_ceiling: Duration,
}

impl RoundExecutor {
    pub(crate) fn new(chunk_client: Arc<dyn ChunkDeleteClient>, wait_ceiling: Duration) -> Self {
        Self {
            chunk_client,
            wait_ceiling,
        }
    }

    /// Invokes the chunk client once and waits up to the ceiling for its reply.
    pub(crate) async fn run_round(
        &self,
        request: &ChunkDeleteRequest,
        replicated: bool,
        round: u32,
    ) -> RoundResult {
        let result = if replicated {
            match tokio::time::timeout(
                self.wait_ceiling,
                self.chunk_client.delete_chunk_replicated(request),
            )
            .await
            {
                Ok(Ok(outcome)) => aggregate_outcomes(round, [(None, outcome)]),
                Ok(Err(error)) => RoundResult::failed(
                    round,
                    0,
                    format!("chunk delete call failed: {error}"),
                ),
                Err(_) => self.ceiling_exceeded(round),
            }
        } else {
            match tokio::time::timeout(
                self.wait_ceiling,
                self.chunk_client.delete_chunk_all_partitions(request),
            )
            .await
            {
                Ok(Ok(outcomes)) => aggregate_outcomes(
                    round,
                    outcomes
                        .into_iter()
                        .map(|partition| (Some(partition.partition_id), partition.outcome)),
                ),
                Ok(Err(error)) => RoundResult::failed(
                    round,
                    0,
                    format!("chunk delete call failed: {error}"),
                ),
                Err(_) => self.ceiling_exceeded(round),
            }
        };

        if result.is_success() {
            debug!(
                round,
                table = %request.table_name,
                rows_exported = result.rows_exported,
                rows_remaining = result.rows_remaining,
                "purge round completed"
            );
        } else {
            warn!(
                round,
                table = %request.table_name,
                rows_exported = result.rows_exported,
                error = %result.error_message,
                "purge round failed"
            );
        }

        result
    }

    /// Runs one round unless the token is cancelled first.
    ///
    /// Returns `None` when the round was abandoned.
    pub(crate) async fn run_round_until_cancelled(
        &self,
        request: &ChunkDeleteRequest,
        replicated: bool,
        round: u32,
        cancellation: &CancellationToken,
    ) -> Option<RoundResult> {
        tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                debug!(round, table = %request.table_name, "purge round abandoned");
                None
            }
            result = self.run_round(request, replicated, round) => Some(result),
        }
    }

    fn ceiling_exceeded(&self, round: u32) -> RoundResult {
        RoundResult::failed(
            round,
            0,
            format!(
                "no reply from chunk delete call within {} ms",
                self.wait_ceiling.as_millis()
            ),
        )
    }
}

/// Sums successful outcomes; the last fatal outcome supplies the round's message.
pub(crate) fn aggregate_outcomes(
    round: u32,
    outcomes: impl IntoIterator<Item = (Option<u32>, ChunkOutcome)>,
) -> RoundResult {
    let mut result = RoundResult::new(round);

    for (partition_id, outcome) in outcomes {
        match outcome {
            ChunkOutcome::Success {
                rows_exported,
                rows_remaining,
            } => {
                result.rows_exported = result.rows_exported.saturating_add(rows_exported);
                result.rows_remaining = result.rows_remaining.saturating_add(rows_remaining);
            }
            ChunkOutcome::AmbiguousNodeFailure => {
                debug!(round, ?partition_id, "chunk outcome unknown, counting no progress");
            }
            ChunkOutcome::Fatal { message } => {
                let message = if message.trim().is_empty() {
                    "chunk delete failed without details".to_owned()
                } else {
                    message
                };
                result.error_message = match partition_id {
                    Some(partition_id) => format!("partition {partition_id}: {message}"),
                    None => message,
                };
            }
        }
    }

    result
}
