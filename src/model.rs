/// Core data types shared by every module of the crate.
///
/// This module defines identifiers, special column ids, sentinel strings
/// and the sensor-type descriptor. It contains no logic beyond trivial
/// accessors and no I/O.
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Database id of a file column (or one of the special position columns).
pub type ColumnId = i64;

/// Database id of a dataset.
pub type DatasetId = i64;

/// Marker id for a value that has not been stored yet.
pub const NO_DATABASE_RECORD: i64 = -1;

/// Special column id holding longitude values.
pub const LONGITUDE_COLUMN_ID: ColumnId = -1000;

/// Special column id holding latitude values.
pub const LATITUDE_COLUMN_ID: ColumnId = -1001;

/// Returns `true` for the special position columns.
pub fn is_position_column(column_id: ColumnId) -> bool {
    column_id == LONGITUDE_COLUMN_ID || column_id == LATITUDE_COLUMN_ID
}

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Payload of a synthetic value that was matched but has no measurement.
pub const NO_VALUE: &str = "-9223372036854775808";

/// QC message given to values created without a payload.
pub const MISSING_QC_COMMENT: &str = "Missing";

/// Prefix marking a user QC message that came from position QC.
pub const POSITION_QC_PREFIX: &str = "Position: ";

/// Separator used when QC messages are combined.
pub const QC_MESSAGE_SEPARATOR: &str = ";";

// ---------------------------------------------------------------------------
// Sensor types
// ---------------------------------------------------------------------------

/// Descriptor of the kind of sensor a column belongs to (e.g. sea surface
/// temperature, salinity, xCO2).
///
/// Resolved from a column id by [`crate::store::SensorAssignments`]. Two
/// columns can only share a list when their sensor types are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorType {
    pub id: i64,
    pub name: String,
    /// Short code used in column headings, e.g. "SST".
    pub column_code: String,
}

impl SensorType {
    pub fn new(id: i64, name: &str, column_code: &str) -> Self {
        SensorType {
            id,
            name: name.to_string(),
            column_code: column_code.to_string(),
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
