use serde::{Deserialize, Serialize};
use trimstream_core::{AppError, AppResult};

/// Rows-remaining value reported when a round's outcome is unknown.
pub const ROWS_REMAINING_UNKNOWN: i64 = -1;

/// Textual purge invocation as received from callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeInvocation {
    /// Target table name, matched case-insensitively.
    pub table_name: String,
    /// Predicate column name, matched case-insensitively.
    pub column_name: String,
    /// Threshold value parsed according to the column type.
    pub value: String,
    /// Comparison operator symbol: `>`, `<`, `>=`, `<=` or `==`.
    pub operator: String,
    /// Maximum rows removed per target in one round.
    pub chunk_size: u64,
    /// Wait budget for the scheduled rounds in milliseconds.
    pub timeout_ms: u64,
    /// Maximum rounds per invocation, including the first.
    pub max_rounds: u32,
    /// Window over which scheduled rounds are spread, in seconds.
    pub pacing_interval_seconds: u64,
    /// Export stream receiving removed rows.
    pub stream_name: String,
}

/// Aggregated outcome of one round across all targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    /// 1-based round number; round 1 is the synchronous round.
    pub round: u32,
    /// Rows exported by this round.
    pub rows_exported: i64,
    /// Rows still matching after this round, or [`ROWS_REMAINING_UNKNOWN`].
    pub rows_remaining: i64,
    /// Failure details; empty when the round succeeded.
    pub error_message: String,
}

impl RoundResult {
    /// Creates an empty successful result for one round.
    #[must_use]
    pub fn new(round: u32) -> Self {
        Self {
            round,
            rows_exported: 0,
            rows_remaining: 0,
            error_message: String::new(),
        }
    }

    /// Creates a whole-round failure with unknown remaining rows.
    #[must_use]
    pub fn failed(round: u32, rows_exported: i64, error_message: impl Into<String>) -> Self {
        Self {
            round,
            rows_exported,
            rows_remaining: ROWS_REMAINING_UNKNOWN,
            error_message: error_message.into(),
        }
    }

    /// Returns true when no error was recorded for the round.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_message.is_empty()
    }
}

/// Final status code of a purge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum PurgeStatus {
    /// Every executed round succeeded.
    Success,
    /// At least one round failed or the invocation timed out.
    GracefulFailure,
}

impl PurgeStatus {
    /// Returns the stable numeric code of the status.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::Success => 1,
            Self::GracefulFailure => -2,
        }
    }

    /// Returns stable text value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::GracefulFailure => "graceful_failure",
        }
    }

    /// Parses a numeric status code.
    pub fn from_code(code: i64) -> AppResult<Self> {
        match code {
            1 => Ok(Self::Success),
            -2 => Ok(Self::GracefulFailure),
            _ => Err(AppError::Validation(format!(
                "unknown purge status code '{code}'"
            ))),
        }
    }
}

impl From<PurgeStatus> for i64 {
    fn from(value: PurgeStatus) -> Self {
        value.code()
    }
}

impl TryFrom<i64> for PurgeStatus {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_code(value)
    }
}

/// Single result row produced by a completed purge invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Total rows exported by successful rounds.
    pub rows_exported: i64,
    /// Rows still matching according to the authoritative round.
    pub rows_left: i64,
    /// Rows exported by the authoritative round.
    pub exported_last_round: i64,
    /// Completion wall-clock time in epoch milliseconds.
    pub last_export_timestamp: i64,
    /// Overall status code.
    pub status: PurgeStatus,
    /// Concatenated failure details; empty on success.
    pub message: String,
}

impl PurgeReport {
    /// Returns true when the invocation finished without failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == PurgeStatus::Success
    }
}
