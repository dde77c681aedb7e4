use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::purge_ports::ChunkDeleteRequest;

use super::progress::ProgressState;
use super::round::RoundExecutor;

/// One round fired by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduledRound {
    /// 1-based attempt index within the scheduled phase.
    pub(crate) attempt: u32,
    /// Round number; round 1 is the synchronous round.
    pub(crate) round: u32,
    /// Delay from the start of the scheduled phase.
    pub(crate) offset: Duration,
}

/// Timed driver for the rounds that follow round 1.
///
/// Dropping the scheduler stops the clock and abandons in-flight rounds, so a
/// caller that gives up on the purge future leaves nothing running.
pub(crate) struct PaceScheduler {
    tracker: TaskTracker,
    cancellation: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl PaceScheduler {
    /// Number of rounds still worth scheduling after round 1.
    pub(crate) fn attempts_left(rows_remaining: i64, chunk_size: u64, max_rounds: u32) -> u32 {
        let Ok(rows_remaining) = u64::try_from(rows_remaining) else {
            return 0;
        };
        if chunk_size == 0 {
            return 0;
        }

        let rounds_needed = rows_remaining.div_ceil(chunk_size);
        let capped = rounds_needed.min(u64::from(max_rounds));
        u32::try_from(capped.saturating_sub(1)).unwrap_or(0)
    }

    /// Spreads `attempts_left` rounds evenly across the pacing interval.
    pub(crate) fn plan(attempts_left: u32, pacing_interval: Duration) -> Vec<ScheduledRound> {
        if attempts_left == 0 {
            return Vec::new();
        }

        let interval_ms = u64::try_from(pacing_interval.as_millis()).unwrap_or(u64::MAX);
        let delay_ms = interval_ms / u64::from(attempts_left);

        (1..=attempts_left)
            .map(|attempt| ScheduledRound {
                attempt,
                round: attempt.saturating_add(1),
                offset: Duration::from_millis(delay_ms.saturating_mul(u64::from(attempt))),
            })
            .collect()
    }

    pub(crate) fn new() -> Self {
        let cancellation = CancellationToken::new();
        Self {
            tracker: TaskTracker::new(),
            _cancel_on_drop: cancellation.clone().drop_guard(),
            cancellation,
        }
    }

    /// Starts the clock task that fires every planned round at its offset.
    pub(crate) fn start(
        &self,
        plan: Vec<ScheduledRound>,
        executor: RoundExecutor,
        request: Arc<ChunkDeleteRequest>,
        replicated: bool,
        progress: Arc<ProgressState>,
    ) {
        let final_attempt = plan.last().map_or(0, |scheduled| scheduled.attempt);
        let tracker = self.tracker.clone();
        let cancellation = self.cancellation.clone();
        let phase_start = Instant::now();

        self.tracker.spawn(async move {
            for scheduled in plan {
                tokio::select! {
                    biased;
                    () = cancellation.cancelled() => {
                        debug!(round = scheduled.round, "purge clock stopped before firing round");
                        return;
                    }
                    () = tokio::time::sleep_until(phase_start + scheduled.offset) => {}
                }

                debug!(
                    attempt = scheduled.attempt,
                    round = scheduled.round,
                    offset_ms = u64::try_from(scheduled.offset.as_millis()).unwrap_or(u64::MAX),
                    "firing scheduled purge round"
                );

                let executor = executor.clone();
                let request = Arc::clone(&request);
                let progress = Arc::clone(&progress);
                let cancellation = cancellation.clone();
                tracker.spawn(async move {
                    if let Some(result) = executor
                        .run_round_until_cancelled(
                            &request,
                            replicated,
                            scheduled.round,
                            &cancellation,
                        )
                        .await
                    {
                        progress
                            .record_scheduled_round(scheduled.attempt == final_attempt, &result)
                            .await;
                    }
                });
            }
        });
        self.tracker.close();
    }

    /// Waits for the clock and every fired round; false when the timeout expired first.
    pub(crate) async fn wait(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }

    /// Stops the clock and abandons in-flight rounds.
    pub(crate) fn cancel(&self) {
        self.cancellation.cancel();
    }
}
