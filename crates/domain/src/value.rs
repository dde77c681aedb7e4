use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Typed column value used in predicates and stored rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
    /// Any integer width.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Varchar(String),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl ColumnValue {
    /// Compares two values of compatible types.
    ///
    /// Integers and floats compare numerically with each other. Values of
    /// unrelated types are incomparable and yield `None`.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(left), Self::Integer(right)) => Some(left.cmp(right)),
            (Self::Float(left), Self::Float(right)) => left.partial_cmp(right),
            (Self::Integer(left), Self::Float(right)) => (*left as f64).partial_cmp(right),
            (Self::Float(left), Self::Integer(right)) => left.partial_cmp(&(*right as f64)),
            (Self::Varchar(left), Self::Varchar(right)) => Some(left.cmp(right)),
            (Self::Timestamp(left), Self::Timestamp(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::Varchar(value) => write!(formatter, "'{value}'"),
            Self::Timestamp(value) => write!(formatter, "{}", value.timestamp_millis()),
        }
    }
}
