use async_trait::async_trait;
use serde::Serialize;
use trimstream_core::AppResult;
use trimstream_domain::{ColumnValue, ComparisonOperator, PurgeRequest};

/// Parameters of one bounded delete-and-export call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkDeleteRequest {
    /// Target table name.
    pub table_name: String,
    /// Predicate column name.
    pub column_name: String,
    /// Predicate comparison operator.
    pub operator: ComparisonOperator,
    /// Predicate threshold value.
    pub value: ColumnValue,
    /// Maximum rows removed per target.
    pub chunk_size: u64,
    /// Export stream receiving removed rows.
    pub stream_name: String,
}

impl ChunkDeleteRequest {
    /// Builds the per-round call parameters for a validated purge request.
    #[must_use]
    pub fn from_purge_request(request: &PurgeRequest) -> Self {
        let predicate = request.predicate();
        Self {
            table_name: request.table_name().as_str().to_owned(),
            column_name: predicate.column().as_str().to_owned(),
            operator: predicate.operator(),
            value: predicate.value().clone(),
            chunk_size: request.chunk_size(),
            stream_name: request.stream_name().as_str().to_owned(),
        }
    }
}

/// Result of one chunk delete against one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk removed and exported.
    Success {
        /// Rows removed and appended to the export stream.
        rows_exported: i64,
        /// Rows still matching the predicate on this target.
        rows_remaining: i64,
    },
    /// Target became unreachable mid-call; the effect is unknown.
    AmbiguousNodeFailure,
    /// Target rejected or failed the chunk.
    Fatal {
        /// Human-readable failure details.
        message: String,
    },
}

/// Chunk outcome reported by one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOutcome {
    /// Partition that produced the outcome.
    pub partition_id: u32,
    /// Outcome of the chunk on that partition.
    pub outcome: ChunkOutcome,
}

/// Port executing single-chunk delete-and-export operations.
///
/// An `Err` means the call itself failed before any outcome was received.
#[async_trait]
pub trait ChunkDeleteClient: Send + Sync {
    /// Deletes one chunk from the single copy of a replicated table.
    async fn delete_chunk_replicated(&self, request: &ChunkDeleteRequest)
    -> AppResult<ChunkOutcome>;

    /// Deletes one chunk from every partition and returns one outcome per partition.
    async fn delete_chunk_all_partitions(
        &self,
        request: &ChunkDeleteRequest,
    ) -> AppResult<Vec<PartitionOutcome>>;
}
