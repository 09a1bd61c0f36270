//! Error types for the crate.
//!
//! Contract violations (the caller passed something the list can never
//! accept) and processing failures (the list could not derive its output
//! values) are kept apart so callers can tell "fix your call" from "this
//! data set cannot be reduced".

use crate::model::ColumnId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by [`crate::list::SensorValuesList`] and the registry.
#[derive(Debug, Error)]
pub enum ListError {
    /// The value's column is not one of the list's columns.
    #[error("column {0} does not belong to this list")]
    UnknownColumn(ColumnId),

    /// A member already exists at this timestamp.
    #[error("cannot add two values with the same timestamp ({0})")]
    DuplicateTimestamp(DateTime<Utc>),

    /// Columns with different sensor types were given to one list.
    #[error("all columns must share one sensor type: column {column} is '{found}', expected '{expected}'")]
    MixedSensorTypes {
        column: ColumnId,
        expected: String,
        found: String,
    },

    /// A list was requested for an empty set of columns.
    #[error("a list needs at least one column")]
    NoColumns,

    /// The sensor type of a column could not be resolved.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The resolution settings given to the list are unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Derived values could not be built.
    #[error("sensor values list processing failed: {0}")]
    Processing(#[from] ProcessingError),
}

/// Root causes of a failure to build derived values.
#[derive(Debug, Error, PartialEq)]
pub enum ProcessingError {
    /// None of the members of a group carries GOOD, QUESTIONABLE or BAD.
    #[error("no valid flags in group starting at {0}")]
    NoValidFlags(DateTime<Utc>),

    /// A group with no usable members was closed.
    #[error("empty group")]
    EmptyGroup,
}

/// Errors from the dataset-wide value store and sensor lookup.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("no sensor type assigned to column {0}")]
    UnknownColumn(ColumnId),

    #[error("value for column {column} at {time} already exists")]
    DuplicateValue { column: ColumnId, time: DateTime<Utc> },

    #[error("dataset mismatch: store holds dataset {expected}, value is from dataset {found}")]
    WrongDataset { expected: i64, found: i64 },
}

/// Errors from the QC state machine on a sensor value.
#[derive(Debug, Error, PartialEq)]
pub enum QcError {
    /// Automatic QC can only be applied to values that have been stored.
    #[error("sensor value has not been stored in the database")]
    NotStored,
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from the PostgreSQL persistence adapter.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL must be set")]
    MissingUrl,

    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    #[error("stored auto QC could not be decoded: {0}")]
    AutoQc(#[from] serde_json::Error),

    #[error("unknown QC flag code {0}")]
    UnknownFlag(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for list operations.
pub type Result<T> = std::result::Result<T, ListError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_processing_error_is_wrapped_as_list_processing_failure() {
        let time = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let err: ListError = ProcessingError::NoValidFlags(time).into();
        let text = err.to_string();
        assert!(text.contains("processing failed"), "got '{}'", text);
        assert!(text.contains("no valid flags"), "got '{}'", text);
        assert!(
            std::error::Error::source(&err).is_some(),
            "processing failures should keep their root cause"
        );
    }

    #[test]
    fn test_mixed_sensor_types_message_names_both_types() {
        let err = ListError::MixedSensorTypes {
            column: 7,
            expected: "SST".to_string(),
            found: "Salinity".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("SST") && text.contains("Salinity"));
    }
}
