//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_cluster_client;
mod in_memory_partitioned_store;

pub use http_cluster_client::HttpClusterClient;
pub use in_memory_partitioned_store::{
    ExportRecord, InMemoryPartitionedStore, StoreTarget, TargetFault,
};
