use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trimstream_core::{AppError, AppResult, NonEmptyString};

use crate::value::ColumnValue;

/// Comparison applied between a row value and the retention threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Row value is strictly greater than the threshold.
    #[serde(rename = ">")]
    GreaterThan,
    /// Row value is strictly less than the threshold.
    #[serde(rename = "<")]
    LessThan,
    /// Row value is greater than or equal to the threshold.
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Row value is less than or equal to the threshold.
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// Row value equals the threshold.
    #[serde(rename = "==")]
    Equal,
}

impl ComparisonOperator {
    /// Returns the textual symbol accepted on the invocation surface.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
            Self::Equal => "==",
        }
    }

    /// Returns true when `row <op> threshold` holds for the given ordering.
    #[must_use]
    pub fn holds_for(&self, row_to_threshold: Ordering) -> bool {
        match self {
            Self::GreaterThan => row_to_threshold == Ordering::Greater,
            Self::LessThan => row_to_threshold == Ordering::Less,
            Self::GreaterThanOrEqual => row_to_threshold != Ordering::Less,
            Self::LessThanOrEqual => row_to_threshold != Ordering::Greater,
            Self::Equal => row_to_threshold == Ordering::Equal,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            ">=" => Ok(Self::GreaterThanOrEqual),
            "<=" => Ok(Self::LessThanOrEqual),
            "==" => Ok(Self::Equal),
            _ => Err(AppError::Validation(format!(
                "invalid comparison operator '{}'",
                value.trim()
            ))),
        }
    }
}

impl Display for ComparisonOperator {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.symbol())
    }
}

/// Row selection rule `column <operator> value` driving a purge.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPredicate {
    column: NonEmptyString,
    operator: ComparisonOperator,
    value: ColumnValue,
}

impl RetentionPredicate {
    /// Creates a predicate over one column.
    pub fn new(
        column: impl Into<String>,
        operator: ComparisonOperator,
        value: ColumnValue,
    ) -> AppResult<Self> {
        Ok(Self {
            column: NonEmptyString::new(column)?,
            operator,
            value,
        })
    }

    /// Returns the column the predicate reads.
    #[must_use]
    pub fn column(&self) -> &NonEmptyString {
        &self.column
    }

    /// Returns the comparison operator.
    #[must_use]
    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }

    /// Returns the threshold value.
    #[must_use]
    pub fn value(&self) -> &ColumnValue {
        &self.value
    }

    /// Returns true when a row holding `row_value` in the column is selected.
    ///
    /// Incomparable values never match.
    #[must_use]
    pub fn matches(&self, row_value: &ColumnValue) -> bool {
        row_value
            .compare(&self.value)
            .is_some_and(|ordering| self.operator.holds_for(ordering))
    }
}

impl Display for RetentionPredicate {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {} {}", self.column, self.operator, self.value)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{ComparisonOperator, RetentionPredicate};
    use crate::ColumnValue;

    #[test]
    fn operator_parsing_trims_input() {
        let parsed = " >= ".parse::<ComparisonOperator>();
        assert!(matches!(parsed, Ok(ComparisonOperator::GreaterThanOrEqual)));
    }

    #[test]
    fn operator_parsing_rejects_unknown_symbols() {
        assert!("!=".parse::<ComparisonOperator>().is_err());
        assert!("=".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn predicate_renders_as_sql_like_text() {
        let predicate =
            RetentionPredicate::new("age", ComparisonOperator::GreaterThan, ColumnValue::Integer(30))
                .unwrap_or_else(|_| unreachable!());
        assert_eq!(predicate.to_string(), "age > 30");
    }

    #[test]
    fn predicate_skips_incomparable_rows() {
        let predicate =
            RetentionPredicate::new("age", ComparisonOperator::LessThan, ColumnValue::Integer(30))
                .unwrap_or_else(|_| unreachable!());
        assert!(!predicate.matches(&ColumnValue::Varchar("10".to_owned())));
    }

    fn any_operator() -> impl Strategy<Value = ComparisonOperator> {
        prop_oneof![
            Just(ComparisonOperator::GreaterThan),
            Just(ComparisonOperator::LessThan),
            Just(ComparisonOperator::GreaterThanOrEqual),
            Just(ComparisonOperator::LessThanOrEqual),
            Just(ComparisonOperator::Equal),
        ]
    }

    proptest! {
        #[test]
        fn operator_symbol_parses_back(operator in any_operator()) {
            let parsed = operator.symbol().parse::<ComparisonOperator>();
            prop_assert_eq!(parsed.ok(), Some(operator));
        }

        #[test]
        fn predicate_agrees_with_integer_comparison(
            operator in any_operator(),
            row in -1_000_i64..1_000,
            threshold in -1_000_i64..1_000,
        ) {
            let predicate = RetentionPredicate::new("age", operator, ColumnValue::Integer(threshold))
                .unwrap_or_else(|_| unreachable!());
            let expected = match operator {
                ComparisonOperator::GreaterThan => row > threshold,
                ComparisonOperator::LessThan => row < threshold,
                ComparisonOperator::GreaterThanOrEqual => row >= threshold,
                ComparisonOperator::LessThanOrEqual => row <= threshold,
                ComparisonOperator::Equal => row == threshold,
            };
            prop_assert_eq!(predicate.matches(&ColumnValue::Integer(row)), expected);
        }
    }
}
