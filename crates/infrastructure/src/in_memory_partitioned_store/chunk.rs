use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::Utc;
use trimstream_application::ChunkOutcome;
use trimstream_domain::{ColumnValue, RetentionPredicate, TableDefinition};

use super::ExportRecord;

/// Routes a row to a partition by its partition column value.
///
/// Integers route by remainder so fixtures can place rows deliberately.
pub(super) fn partition_for(value: &ColumnValue, partition_count: u32) -> u32 {
    let partition_count = partition_count.max(1);
    match value {
        ColumnValue::Integer(value) => {
            u32::try_from(value.rem_euclid(i64::from(partition_count))).unwrap_or(0)
        }
        other => {
            let mut hasher = DefaultHasher::new();
            other.to_string().hash(&mut hasher);
            u32::try_from(hasher.finish() % u64::from(partition_count)).unwrap_or(0)
        }
    }
}

/// Removes up to `chunk_size` matching rows, appending each to the export stream.
pub(super) fn delete_chunk(
    definition: &TableDefinition,
    rows: &mut Vec<Vec<ColumnValue>>,
    partition_id: Option<u32>,
    predicate: &RetentionPredicate,
    chunk_size: u64,
    stream: &mut Vec<ExportRecord>,
) -> ChunkOutcome {
    let Some(column_index) = definition.column_index(predicate.column().as_str()) else {
        return ChunkOutcome::Fatal {
            message: format!(
                "column '{}' not found in table '{}'",
                predicate.column(),
                definition.name()
            ),
        };
    };

    let limit = usize::try_from(chunk_size).unwrap_or(usize::MAX);
    let exported_at = Utc::now();
    let mut removed = 0_usize;
    let mut remaining = 0_usize;
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows.drain(..) {
        if !predicate.matches(&row[column_index]) {
            kept.push(row);
            continue;
        }

        if removed < limit {
            removed += 1;
            stream.push(ExportRecord {
                table_name: definition.name().as_str().to_owned(),
                partition_id,
                values: row,
                exported_at,
            });
        } else {
            remaining += 1;
            kept.push(row);
        }
    }
    *rows = kept;

    ChunkOutcome::Success {
        rows_exported: i64::try_from(removed).unwrap_or(i64::MAX),
        rows_remaining: i64::try_from(remaining).unwrap_or(i64::MAX),
    }
}
