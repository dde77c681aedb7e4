//! Application services and ports.

#![forbid(unsafe_code)]

mod purge_ports;
mod purge_service;

pub use purge_ports::{
    ChunkDeleteClient, ChunkDeleteRequest, ChunkOutcome, PartitionOutcome, PurgeCatalog,
    PurgeInvocation, PurgeReport, PurgeStatus, ROWS_REMAINING_UNKNOWN, RoundResult,
};
pub use purge_service::{DEFAULT_ROUND_WAIT_CEILING, PurgeService};
