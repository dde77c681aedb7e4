use std::time::Duration;

use trimstream_core::{AppError, AppResult, NonEmptyString};

use crate::predicate::{ComparisonOperator, RetentionPredicate};
use crate::value::ColumnValue;

/// Unvalidated purge request payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeRequestInput {
    /// Target table name as resolved by the catalog.
    pub table_name: String,
    /// Predicate column name as resolved by the catalog.
    pub column_name: String,
    /// Comparison operator.
    pub operator: ComparisonOperator,
    /// Typed comparison value.
    pub value: ColumnValue,
    /// Maximum rows removed by one round against one target.
    pub chunk_size: u64,
    /// Overall wall-clock budget for the invocation.
    pub timeout: Duration,
    /// Maximum number of rounds, including the first one.
    pub max_rounds: u32,
    /// Window over which the scheduled rounds are spread.
    pub pacing_interval: Duration,
    /// Export stream receiving every removed row.
    pub stream_name: String,
    /// Whether the table has one logical copy.
    pub replicated: bool,
}

/// Validated, immutable description of one purge invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PurgeRequest {
    table_name: NonEmptyString,
    predicate: RetentionPredicate,
    chunk_size: u64,
    timeout: Duration,
    max_rounds: u32,
    pacing_interval: Duration,
    stream_name: NonEmptyString,
    replicated: bool,
}

impl PurgeRequest {
    /// Creates a validated purge request.
    pub fn new(input: PurgeRequestInput) -> AppResult<Self> {
        if input.chunk_size == 0 {
            return Err(AppError::Validation(
                "chunk size must be greater than zero".to_owned(),
            ));
        }

        if input.max_rounds == 0 {
            return Err(AppError::Validation(
                "max rounds must be greater than zero".to_owned(),
            ));
        }

        if input.timeout.is_zero() {
            return Err(AppError::Validation(
                "timeout must be greater than zero".to_owned(),
            ));
        }

        let stream_name = NonEmptyString::new(input.stream_name.trim()).map_err(|_| {
            AppError::Validation("export stream name must not be empty".to_owned())
        })?;

        Ok(Self {
            table_name: NonEmptyString::new(input.table_name)?,
            predicate: RetentionPredicate::new(input.column_name, input.operator, input.value)?,
            chunk_size: input.chunk_size,
            timeout: input.timeout,
            max_rounds: input.max_rounds,
            pacing_interval: input.pacing_interval,
            stream_name,
            replicated: input.replicated,
        })
    }

    /// Returns the target table name.
    #[must_use]
    pub fn table_name(&self) -> &NonEmptyString {
        &self.table_name
    }

    /// Returns the row selection predicate.
    #[must_use]
    pub fn predicate(&self) -> &RetentionPredicate {
        &self.predicate
    }

    /// Returns the per-round chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Returns the overall wall-clock budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the maximum number of rounds including the first.
    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Returns the pacing window for scheduled rounds.
    #[must_use]
    pub fn pacing_interval(&self) -> Duration {
        self.pacing_interval
    }

    /// Returns the export stream name.
    #[must_use]
    pub fn stream_name(&self) -> &NonEmptyString {
        &self.stream_name
    }

    /// Returns true when the target table is replicated.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }
}
