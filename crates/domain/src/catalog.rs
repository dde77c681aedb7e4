use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use trimstream_core::{AppError, AppResult, NonEmptyString};

use crate::value::ColumnValue;

/// Declared storage type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 8-bit signed integer.
    TinyInt,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    Varchar,
    /// UTC timestamp with millisecond precision.
    Timestamp,
}

impl ColumnType {
    /// Returns a stable storage value for the column type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Varchar => "varchar",
            Self::Timestamp => "timestamp",
        }
    }

    /// Converts caller-supplied text into a typed value of this column type.
    pub fn convert(self, raw: &str) -> AppResult<ColumnValue> {
        let conversion_error = || AppError::TypeConversion {
            value: raw.to_owned(),
            target_type: self.as_str().to_owned(),
        };

        match self {
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt => {
                let value = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| conversion_error())?;
                let (min, max) = self.integer_bounds();
                if value < min || value > max {
                    return Err(conversion_error());
                }
                Ok(ColumnValue::Integer(value))
            }
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(ColumnValue::Float)
                .ok_or_else(conversion_error),
            Self::Varchar => Ok(ColumnValue::Varchar(raw.to_owned())),
            Self::Timestamp => parse_timestamp(raw.trim())
                .map(ColumnValue::Timestamp)
                .ok_or_else(conversion_error),
        }
    }

    /// Returns true when the value can be stored in a column of this type.
    #[must_use]
    pub fn accepts(&self, value: &ColumnValue) -> bool {
        match (self, value) {
            (
                Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt,
                ColumnValue::Integer(value),
            ) => {
                let (min, max) = self.integer_bounds();
                (min..=max).contains(value)
            }
            (Self::Float, ColumnValue::Float(_) | ColumnValue::Integer(_)) => true,
            (Self::Varchar, ColumnValue::Varchar(_)) => true,
            (Self::Timestamp, ColumnValue::Timestamp(_)) => true,
            _ => false,
        }
    }

    fn integer_bounds(self) -> (i64, i64) {
        match self {
            Self::TinyInt => (i64::from(i8::MIN), i64::from(i8::MAX)),
            Self::SmallInt => (i64::from(i16::MIN), i64::from(i16::MAX)),
            Self::Integer => (i64::from(i32::MIN), i64::from(i32::MAX)),
            _ => (i64::MIN, i64::MAX),
        }
    }
}

impl FromStr for ColumnType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tinyint" => Ok(Self::TinyInt),
            "smallint" => Ok(Self::SmallInt),
            "integer" => Ok(Self::Integer),
            "bigint" => Ok(Self::BigInt),
            "float" => Ok(Self::Float),
            "varchar" => Ok(Self::Varchar),
            "timestamp" => Ok(Self::Timestamp),
            _ => Err(AppError::Validation(format!(
                "unknown column type '{value}'"
            ))),
        }
    }
}

// Epoch milliseconds, RFC 3339, or a naive UTC "YYYY-MM-DD HH:MM:SS[.fff]".
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = raw.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(millis);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// One column in a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    name: NonEmptyString,
    column_type: ColumnType,
}

impl ColumnDefinition {
    /// Creates a validated column definition.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> AppResult<Self> {
        Ok(Self {
            name: NonEmptyString::new(name)?,
            column_type,
        })
    }

    /// Returns the column name as declared.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the declared column type.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

/// How a table's rows are laid out across the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableDistribution {
    /// One logical copy addressed by a single call.
    Replicated,
    /// Rows sharded across partitions by one column.
    Partitioned {
        /// Column used to route rows to partitions.
        partition_column: String,
    },
}

/// Catalog entry for a purgeable table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: NonEmptyString,
    columns: Vec<ColumnDefinition>,
    distribution: TableDistribution,
}

impl TableDefinition {
    /// Creates a validated table definition.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        distribution: TableDistribution,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;

        if columns.is_empty() {
            return Err(AppError::Validation(format!(
                "table '{name}' must declare at least one column"
            )));
        }

        for (index, column) in columns.iter().enumerate() {
            let duplicate = columns[..index].iter().any(|earlier| {
                earlier
                    .name()
                    .as_str()
                    .eq_ignore_ascii_case(column.name().as_str())
            });
            if duplicate {
                return Err(AppError::Validation(format!(
                    "table '{name}' declares column '{}' more than once",
                    column.name()
                )));
            }
        }

        let table = Self {
            name,
            columns,
            distribution,
        };

        if let TableDistribution::Partitioned { partition_column } = &table.distribution
            && table.find_column(partition_column).is_none()
        {
            return Err(AppError::Validation(format!(
                "partition column '{partition_column}' is not a column of table '{}'",
                table.name
            )));
        }

        Ok(table)
    }

    /// Returns the table name as declared.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the declared columns in order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Returns the row distribution.
    #[must_use]
    pub fn distribution(&self) -> &TableDistribution {
        &self.distribution
    }

    /// Returns true when the table has one logical copy.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        matches!(self.distribution, TableDistribution::Replicated)
    }

    /// Returns the position of a column, matched case-insensitively.
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        let column_name = column_name.trim();
        self.columns
            .iter()
            .position(|column| column.name().as_str().eq_ignore_ascii_case(column_name))
    }

    /// Finds a column by name, matched case-insensitively.
    #[must_use]
    pub fn find_column(&self, column_name: &str) -> Option<&ColumnDefinition> {
        self.column_index(column_name)
            .map(|index| &self.columns[index])
    }

    /// Finds a column by name or fails with a not-found error.
    pub fn require_column(&self, column_name: &str) -> AppResult<&ColumnDefinition> {
        self.find_column(column_name).ok_or_else(|| {
            AppError::NotFound(format!(
                "column '{}' not found in table '{}'",
                column_name.trim(),
                self.name
            ))
        })
    }
}
