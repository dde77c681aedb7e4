mod catalog;
mod chunk_client;
mod execution;

pub use catalog::PurgeCatalog;
pub use chunk_client::{ChunkDeleteClient, ChunkDeleteRequest, ChunkOutcome, PartitionOutcome};
pub use execution::{
    PurgeInvocation, PurgeReport, PurgeStatus, ROWS_REMAINING_UNKNOWN, RoundResult,
};
