use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use trimstream_application::{
    ChunkDeleteClient, ChunkDeleteRequest, ChunkOutcome, PartitionOutcome, PurgeCatalog,
};
use trimstream_core::{AppError, AppResult};
use trimstream_domain::{ColumnValue, RetentionPredicate, TableDefinition, TableDistribution};

mod chunk;

use chunk::{delete_chunk, partition_for};

/// Addressable copy of table data inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTarget {
    /// The single copy of every replicated table.
    Replica,
    /// One partition of the partitioned tables.
    Partition(u32),
}

/// Injected failure mode for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFault {
    /// Target does not answer; the chunk outcome is unknown.
    Unavailable,
    /// Target answers with an error.
    Failing(String),
}

/// Row appended to an export stream when a chunk removes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    /// Table the row was removed from.
    pub table_name: String,
    /// Partition that held the row; `None` for replicated tables.
    pub partition_id: Option<u32>,
    /// Column values in table column order.
    pub values: Vec<ColumnValue>,
    /// Time the row was exported.
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredTable {
    definition: TableDefinition,
    replica_rows: Vec<Vec<ColumnValue>>,
    partition_rows: Vec<Vec<Vec<ColumnValue>>>,
}

#[derive(Debug)]
struct StoreState {
    partition_count: u32,
    tables: HashMap<String, StoredTable>,
    export_streams: HashMap<String, Vec<ExportRecord>>,
    faults: HashMap<StoreTarget, TargetFault>,
}

/// In-memory cluster holding replicated and partitioned tables with export streams.
///
/// Export streams are append-only: rows can only enter them through chunk deletes.
#[derive(Debug)]
pub struct InMemoryPartitionedStore {
    state: RwLock<StoreState>,
}

fn table_key(table_name: &str) -> String {
    table_name.trim().to_ascii_lowercase()
}

impl InMemoryPartitionedStore {
    /// Creates an empty store with the given number of partitions (at least one).
    #[must_use]
    pub fn new(partition_count: u32) -> Self {
        Self {
            state: RwLock::new(StoreState {
                partition_count: partition_count.max(1),
                tables: HashMap::new(),
                export_streams: HashMap::new(),
                faults: HashMap::new(),
            }),
        }
    }

    /// Registers a table definition.
    pub async fn create_table(&self, definition: TableDefinition) -> AppResult<()> {
        let key = table_key(definition.name().as_str());
        let mut state = self.state.write().await;

        if state.tables.contains_key(&key) {
            return Err(AppError::Validation(format!(
                "table '{}' already exists",
                definition.name()
            )));
        }

        let partition_rows = vec![Vec::new(); state.partition_count as usize];
        state.tables.insert(
            key,
            StoredTable {
                definition,
                replica_rows: Vec::new(),
                partition_rows,
            },
        );
        Ok(())
    }

    /// Inserts rows, routing partitioned tables by their partition column.
    pub async fn insert_rows(
        &self,
        table_name: &str,
        rows: Vec<Vec<ColumnValue>>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let partition_count = state.partition_count;
        let table = state
            .tables
            .get_mut(&table_key(table_name))
            .ok_or_else(|| AppError::NotFound(format!("table '{table_name}' not found")))?;

        for row in &rows {
            validate_row(&table.definition, row)?;
        }

        match table.definition.distribution().clone() {
            TableDistribution::Replicated => table.replica_rows.extend(rows),
            TableDistribution::Partitioned { partition_column } => {
                let index = table
                    .definition
                    .column_index(&partition_column)
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "partition column '{partition_column}' missing from '{table_name}'"
                        ))
                    })?;
                for row in rows {
                    let partition = partition_for(&row[index], partition_count);
                    table.partition_rows[partition as usize].push(row);
                }
            }
        }

        Ok(())
    }

    /// Changes the partition count and redistributes every partitioned row.
    pub async fn set_partition_count(&self, partition_count: u32) -> AppResult<()> {
        if partition_count == 0 {
            return Err(AppError::Validation(
                "partition count must be greater than zero".to_owned(),
            ));
        }

        let mut state = self.state.write().await;
        state.partition_count = partition_count;
        state.faults.retain(|target, _| match target {
            StoreTarget::Partition(id) => *id < partition_count,
            StoreTarget::Replica => true,
        });

        for table in state.tables.values_mut() {
            let TableDistribution::Partitioned { partition_column } =
                table.definition.distribution()
            else {
                continue;
            };
            let Some(index) = table.definition.column_index(partition_column) else {
                continue;
            };

            let rows: Vec<_> = table.partition_rows.drain(..).flatten().collect();
            table.partition_rows = vec![Vec::new(); partition_count as usize];
            for row in rows {
                let partition = partition_for(&row[index], partition_count);
                table.partition_rows[partition as usize].push(row);
            }
        }

        Ok(())
    }

    /// Installs or clears a fault on one target.
    pub async fn set_fault(&self, target: StoreTarget, fault: Option<TargetFault>) {
        let mut state = self.state.write().await;
        match fault {
            Some(fault) => {
                state.faults.insert(target, fault);
            }
            None => {
                state.faults.remove(&target);
            }
        }
    }

    /// Returns the current partition count.
    pub async fn partition_count(&self) -> u32 {
        self.state.read().await.partition_count
    }

    /// Counts stored rows of a table across all targets.
    pub async fn row_count(&self, table_name: &str) -> AppResult<usize> {
        let state = self.state.read().await;
        let table = state
            .tables
            .get(&table_key(table_name))
            .ok_or_else(|| AppError::NotFound(format!("table '{table_name}' not found")))?;

        Ok(table.replica_rows.len() + table.partition_rows.iter().map(Vec::len).sum::<usize>())
    }

    /// Returns a copy of every record exported to a stream so far.
    pub async fn export_stream(&self, stream_name: &str) -> Vec<ExportRecord> {
        self.state
            .read()
            .await
            .export_streams
            .get(stream_name)
            .cloned()
            .unwrap_or_default()
    }
}

fn validate_row(definition: &TableDefinition, row: &[ColumnValue]) -> AppResult<()> {
    if row.len() != definition.columns().len() {
        return Err(AppError::Validation(format!(
            "table '{}' expects {} values per row but got {}",
            definition.name(),
            definition.columns().len(),
            row.len()
        )));
    }

    for (column, value) in definition.columns().iter().zip(row) {
        if !column.column_type().accepts(value) {
            return Err(AppError::Validation(format!(
                "value {value} does not fit column '{}' of type {}",
                column.name(),
                column.column_type().as_str()
            )));
        }
    }

    Ok(())
}

fn request_predicate(request: &ChunkDeleteRequest) -> AppResult<RetentionPredicate> {
    RetentionPredicate::new(
        request.column_name.as_str(),
        request.operator,
        request.value.clone(),
    )
}

#[async_trait]
impl PurgeCatalog for InMemoryPartitionedStore {
    async fn find_table(&self, table_name: &str) -> AppResult<Option<TableDefinition>> {
        Ok(self
            .state
            .read()
            .await
            .tables
            .get(&table_key(table_name))
            .map(|table| table.definition.clone()))
    }
}

#[async_trait]
impl ChunkDeleteClient for InMemoryPartitionedStore {
    async fn delete_chunk_replicated(
        &self,
        request: &ChunkDeleteRequest,
    ) -> AppResult<ChunkOutcome> {
        let predicate = request_predicate(request)?;
        let mut state = self.state.write().await;
        let StoreState {
            tables,
            export_streams,
            faults,
            ..
        } = &mut *state;

        match faults.get(&StoreTarget::Replica) {
            Some(TargetFault::Unavailable) => return Ok(ChunkOutcome::AmbiguousNodeFailure),
            Some(TargetFault::Failing(message)) => {
                return Ok(ChunkOutcome::Fatal {
                    message: message.clone(),
                });
            }
            None => {}
        }

        let Some(table) = tables.get_mut(&table_key(&request.table_name)) else {
            return Ok(ChunkOutcome::Fatal {
                message: format!("table '{}' not found", request.table_name),
            });
        };
        if !table.definition.is_replicated() {
            return Ok(ChunkOutcome::Fatal {
                message: format!("table '{}' is partitioned", request.table_name),
            });
        }

        let stream = export_streams
            .entry(request.stream_name.clone())
            .or_default();
        Ok(delete_chunk(
            &table.definition,
            &mut table.replica_rows,
            None,
            &predicate,
            request.chunk_size,
            stream,
        ))
    }

    async fn delete_chunk_all_partitions(
        &self,
        request: &ChunkDeleteRequest,
    ) -> AppResult<Vec<PartitionOutcome>> {
        let predicate = request_predicate(request)?;
        let mut state = self.state.write().await;
        let StoreState {
            partition_count,
            tables,
            export_streams,
            faults,
        } = &mut *state;

        let mut table = tables.get_mut(&table_key(&request.table_name));
        let stream = export_streams
            .entry(request.stream_name.clone())
            .or_default();

        let outcomes: Vec<PartitionOutcome> = (0..*partition_count)
            .map(|partition_id| {
                let fault = faults.get(&StoreTarget::Partition(partition_id));
                let outcome = match (fault, table.as_deref_mut()) {
                    (Some(TargetFault::Unavailable), _) => ChunkOutcome::AmbiguousNodeFailure,
                    (Some(TargetFault::Failing(message)), _) => ChunkOutcome::Fatal {
                        message: message.clone(),
                    },
                    (None, None) => ChunkOutcome::Fatal {
                        message: format!("table '{}' not found", request.table_name),
                    },
                    (None, Some(table)) if table.definition.is_replicated() => {
                        ChunkOutcome::Fatal {
                            message: format!("table '{}' is replicated", request.table_name),
                        }
                    }
                    (None, Some(table)) => delete_chunk(
                        &table.definition,
                        &mut table.partition_rows[partition_id as usize],
                        Some(partition_id),
                        &predicate,
                        request.chunk_size,
                        stream,
                    ),
                };
                PartitionOutcome {
                    partition_id,
                    outcome,
                }
            })
            .collect();

        Ok(outcomes)
    }
}
