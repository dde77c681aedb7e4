//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod catalog;
mod predicate;
mod purge;
mod value;

pub use catalog::{ColumnDefinition, ColumnType, TableDefinition, TableDistribution};
pub use predicate::{ComparisonOperator, RetentionPredicate};
pub use purge::{PurgeRequest, PurgeRequestInput};
pub use value::ColumnValue;
