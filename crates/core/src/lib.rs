//! Shared primitives for all Rust crates in Trimstream.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across Trimstream crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Identifier attached to one purge invocation for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurgeRunId(Uuid);

impl PurgeRunId {
    /// Creates a random run identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PurgeRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PurgeRunId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested table, column or partition does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Textual value could not be converted to a column type.
    #[error("unable to convert value '{value}' to column type '{target_type}'")]
    TypeConversion {
        /// Raw value supplied by the caller.
        value: String,
        /// Stable name of the requested column type.
        target_type: String,
    },

    /// A purge matched rows but removed none of them.
    #[error("purge made no progress: {0}")]
    ProgressStalled(String),

    /// Remote call failed before a reply was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString, PurgeRunId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn purge_run_id_formats_as_uuid() {
        let run_id = PurgeRunId::new();
        assert_eq!(run_id.to_string().len(), 36);
    }

    #[test]
    fn type_conversion_error_names_target_type() {
        let error = AppError::TypeConversion {
            value: "abc".to_owned(),
            target_type: "bigint".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "unable to convert value 'abc' to column type 'bigint'"
        );
    }
}
