/// A single timestamped raw reading and its QC state.
///
/// A `SensorValue` is identified by (dataset id, column id, time). Its
/// payload is kept as the original string (numbers are parsed on demand)
/// and may be absent. QC state has two layers:
///
/// - the automatic QC result, appended to by QC routines;
/// - the user QC flag and message, which default to ASSUMED_GOOD, switch
///   to NEEDED when automatic QC raises anything, and can be overridden
///   by a human reviewer.
///
/// FLUSHING is sticky: once the user flag is FLUSHING it is never
/// overwritten. A user message carrying position QC is never silently
/// replaced.
use crate::error::QcError;
use crate::flag::Flag;
use crate::model::{
    ColumnId, DatasetId, LONGITUDE_COLUMN_ID, MISSING_QC_COMMENT,
    NO_DATABASE_RECORD, NO_VALUE, POSITION_QC_PREFIX, QC_MESSAGE_SEPARATOR,
};
use crate::numeric::{double_from_string, interpolate_at};
use crate::qc::{AutoQcResult, RoutineFlag};
use chrono::{DateTime, TimeZone, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Sensor values are shared between the dataset store, lists and derived
/// values; none of those owns the reading itself.
pub type SharedSensorValue = Arc<SensorValue>;

/// Everything stored for a sensor value, as read back from persistence.
#[derive(Debug, Clone)]
pub struct SensorValueRecord {
    pub id: i64,
    pub dataset_id: DatasetId,
    pub column_id: ColumnId,
    pub time: DateTime<Utc>,
    pub value: Option<String>,
    pub auto_qc: AutoQcResult,
    pub user_qc_flag: Flag,
    pub user_qc_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SensorValue {
    id: i64,
    dataset_id: DatasetId,
    column_id: ColumnId,
    time: DateTime<Utc>,
    value: Option<String>,
    auto_qc: AutoQcResult,
    user_qc_flag: Flag,
    user_qc_message: Option<String>,
    dirty: bool,
    can_be_saved: bool,
}

impl SensorValue {
    /// A freshly read value that has not been stored yet.
    ///
    /// A value with no payload starts out BAD with the message "Missing".
    pub fn new(
        dataset_id: DatasetId,
        column_id: ColumnId,
        time: DateTime<Utc>,
        value: Option<&str>,
    ) -> Self {
        let (user_qc_flag, user_qc_message) = match value {
            Some(_) => (Flag::AssumedGood, None),
            None => (Flag::Bad, Some(MISSING_QC_COMMENT.to_string())),
        };

        SensorValue {
            id: NO_DATABASE_RECORD,
            dataset_id,
            column_id,
            time,
            value: value.map(String::from),
            auto_qc: AutoQcResult::new(),
            user_qc_flag,
            user_qc_message,
            dirty: true,
            can_be_saved: true,
        }
    }

    /// Copy of this value moved to a different timestamp. The copy cannot
    /// be saved.
    pub fn with_time(&self, new_time: DateTime<Utc>) -> Self {
        SensorValue {
            time: new_time,
            dirty: false,
            can_be_saved: false,
            ..self.clone()
        }
    }

    /// Copy of this value marked as "no value", flagged NO_QC.
    pub fn no_value_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.value = Some(NO_VALUE.to_string());
        copy.set_user_qc(Flag::NoQc, "No Value");
        copy
    }

    // -----------------------------------------------------------------------
    // Identity and payload
    // -----------------------------------------------------------------------

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The payload in its original string form.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: Option<&str>) {
        self.value = value.map(String::from);
        self.dirty = true;
    }

    /// `true` when there is no payload or the payload is the NO_VALUE marker.
    pub fn no_value(&self) -> bool {
        matches!(self.value.as_deref(), None | Some(NO_VALUE))
    }

    /// `true` when there is no payload or it is an empty string.
    pub fn is_blank(&self) -> bool {
        self.value.as_deref().is_none_or(|v| v.trim().is_empty())
    }

    /// The payload as a number; NaN for missing or non-numeric payloads.
    pub fn double_value(&self) -> f64 {
        if self.no_value() {
            f64::NAN
        } else {
            self.value.as_deref().map_or(f64::NAN, double_from_string)
        }
    }

    pub fn is_nan(&self) -> bool {
        self.double_value().is_nan()
    }

    /// `true` when the payload is present and parses as a number.
    pub fn is_numeric(&self) -> bool {
        !self.is_nan()
    }

    // -----------------------------------------------------------------------
    // QC state
    // -----------------------------------------------------------------------

    pub fn auto_qc(&self) -> &AutoQcResult {
        &self.auto_qc
    }

    pub fn auto_qc_flag(&self) -> Flag {
        self.auto_qc.overall_flag()
    }

    /// The user flag. With `ignore_needed`, a NEEDED flag is replaced by
    /// the automatic QC flag that caused it.
    pub fn user_qc_flag(&self, ignore_needed: bool) -> Flag {
        if ignore_needed && self.user_qc_flag == Flag::Needed {
            self.auto_qc_flag()
        } else {
            self.user_qc_flag
        }
    }

    /// The user message, or an empty string. With `ignore_position`, a
    /// position QC message is suppressed on anything but the longitude
    /// column.
    pub fn user_qc_message(&self, ignore_position: bool) -> String {
        let message = self.user_qc_message.clone().unwrap_or_default();
        if ignore_position
            && message.starts_with(POSITION_QC_PREFIX)
            && self.column_id != LONGITUDE_COLUMN_ID
        {
            String::new()
        } else {
            message
        }
    }

    pub fn flag_needed(&self) -> bool {
        self.user_qc_flag == Flag::Needed
    }

    pub fn is_flushing(&self) -> bool {
        self.user_qc_flag == Flag::Flushing
    }

    pub fn has_position_qc(&self) -> bool {
        self.user_qc_message
            .as_deref()
            .is_some_and(|m| m.contains(POSITION_QC_PREFIX))
    }

    /// The flag to show for this value: the automatic flag while user QC
    /// is still NEEDED, the user flag otherwise.
    pub fn display_flag(&self) -> Flag {
        if self.flag_needed() {
            self.auto_qc_flag()
        } else {
            self.user_qc_flag
        }
    }

    /// The QC message matching [`SensorValue::display_flag`]. Position QC
    /// messages are returned as stored; use
    /// [`crate::store::DatasetContext::qc_message`] to resolve them against
    /// the position columns.
    pub fn display_qc_message(&self) -> String {
        if self.flag_needed() {
            self.auto_qc.all_messages()
        } else {
            self.user_qc_message(false)
        }
    }

    /// Adds a flag from an automatic QC routine. Unless a human has set
    /// the user flag, the user flag becomes NEEDED.
    pub fn add_auto_qc_flag(&mut self, flag: RoutineFlag) -> Result<(), QcError> {
        if !self.is_in_database() {
            return Err(QcError::NotStored);
        }

        self.auto_qc.add(flag);

        if matches!(self.user_qc_flag, Flag::AssumedGood | Flag::Needed) {
            self.user_qc_flag = Flag::Needed;
            self.user_qc_message = Some(self.auto_qc.all_messages());
        }

        self.dirty = true;
        Ok(())
    }

    /// Discards the automatic QC result. User QC that was only reflecting
    /// automatic QC is reset to ASSUMED_GOOD.
    pub fn clear_automatic_qc(&mut self) -> Result<(), QcError> {
        if !self.is_in_database() {
            return Err(QcError::NotStored);
        }

        self.auto_qc = AutoQcResult::new();

        if matches!(self.user_qc_flag, Flag::AssumedGood | Flag::Needed) {
            self.user_qc_flag = Flag::AssumedGood;
            self.user_qc_message = None;
        }

        self.dirty = true;
        Ok(())
    }

    /// Sets the user QC. Returns `false` (and changes nothing) if the value
    /// is FLUSHING or already carries a position QC message.
    pub fn set_user_qc(&mut self, flag: Flag, message: &str) -> bool {
        if self.is_flushing() || self.has_position_qc() {
            return false;
        }

        self.apply_user_qc(flag, Some(message.to_string()));
        true
    }

    /// Merges a position QC result into this value's user QC.
    ///
    /// A GOOD position result only matters if the value currently carries
    /// position QC, in which case the value reverts to its automatic QC.
    /// A worse position result replaces the user QC when it is more
    /// significant, and is appended to the message when equal.
    pub fn set_position_qc(&mut self, position_flag: Flag, position_message: &str) {
        let prefixed = format!("{}{}", POSITION_QC_PREFIX, position_message);

        if position_flag.is_good() {
            if self.has_position_qc() {
                self.revert_to_auto_qc();
            }
            return;
        }

        let sensor_flag = self.user_qc_flag(true);
        let needed = self.user_qc_flag == Flag::Needed;

        if sensor_flag.more_significant_than(position_flag) {
            // The old flag may have come from an earlier position QC. If so,
            // start again from the automatic QC and re-apply.
            if self.has_position_qc() {
                self.revert_to_auto_qc();

                let auto_flag = self.auto_qc_flag();
                if position_flag.more_significant_than(auto_flag) {
                    self.apply_user_qc(position_flag, Some(prefixed));
                } else if position_flag == auto_flag {
                    self.user_qc_flag = position_flag;
                    self.add_user_qc_message(&prefixed);
                }
            }
        } else if position_flag.more_significant_than(sensor_flag) {
            self.apply_user_qc(position_flag, Some(prefixed));
        } else {
            if !self.has_position_qc() {
                self.add_user_qc_message(&prefixed);
            }

            if needed {
                self.user_qc_flag = position_flag;
            }

            self.dirty = true;
        }

        log::debug!(
            target: "qc",
            "position QC {} applied to column {} at {}: now {}",
            position_flag,
            self.column_id,
            self.time,
            self.user_qc_flag
        );
    }

    fn apply_user_qc(&mut self, flag: Flag, message: Option<String>) {
        self.user_qc_flag = flag;
        self.user_qc_message = message;
        self.dirty = true;
    }

    fn add_user_qc_message(&mut self, message: &str) {
        let combined = match self.user_qc_message.take() {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}{}{}", existing, QC_MESSAGE_SEPARATOR, message)
            }
            _ => message.to_string(),
        };
        self.user_qc_message = Some(combined);
    }

    fn revert_to_auto_qc(&mut self) {
        if self.auto_qc_flag().is_good() {
            self.apply_user_qc(Flag::AssumedGood, None);
        } else {
            let messages = self.auto_qc.all_messages();
            self.apply_user_qc(Flag::Needed, Some(messages));
        }
    }

    // -----------------------------------------------------------------------
    // Persistence state
    // -----------------------------------------------------------------------

    pub fn is_in_database(&self) -> bool {
        self.id != NO_DATABASE_RECORD
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// `false` for re-timed copies, which do not correspond to a stored row.
    pub fn can_be_saved(&self) -> bool {
        self.can_be_saved
    }

    /// Marks the value as stored under `id` (after an insert).
    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl From<SensorValueRecord> for SensorValue {
    fn from(record: SensorValueRecord) -> Self {
        SensorValue {
            id: record.id,
            dataset_id: record.dataset_id,
            column_id: record.column_id,
            time: record.time,
            value: record.value,
            auto_qc: record.auto_qc,
            user_qc_flag: record.user_qc_flag,
            user_qc_message: record.user_qc_message,
            dirty: false,
            can_be_saved: true,
        }
    }
}

// Identity is (dataset, column, time); QC state does not take part.
impl PartialEq for SensorValue {
    fn eq(&self, other: &Self) -> bool {
        self.dataset_id == other.dataset_id
            && self.column_id == other.column_id
            && self.time == other.time
    }
}

impl Eq for SensorValue {}

impl Hash for SensorValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dataset_id.hash(state);
        self.column_id.hash(state);
        self.time.hash(state);
    }
}

impl PartialOrd for SensorValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SensorValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.dataset_id.cmp(&other.dataset_id))
            .then(self.column_id.cmp(&other.column_id))
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.no_value() {
            "No Value"
        } else {
            self.value.as_deref().unwrap_or_default()
        };
        write!(f, "{}: {} = {}", self.time, self.column_id, shown)
    }
}

// ---------------------------------------------------------------------------
// Collection helpers
// ---------------------------------------------------------------------------

/// Mean timestamp of a set of values, optionally skipping NaN payloads.
/// Returns `None` if no value qualifies.
pub fn mean_time<'a, I>(values: I, include_nan: bool) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a SensorValue>,
{
    let (total, count) = values
        .into_iter()
        .filter(|v| include_nan || !v.is_nan())
        .fold((0_i128, 0_i128), |(total, count), v| {
            (total + v.time().timestamp_millis() as i128, count + 1)
        });

    if count == 0 {
        return None;
    }

    Utc.timestamp_millis_opt((total / count) as i64).single()
}

/// Mean of the numeric payloads, ignoring NaN. NaN if nothing qualifies.
pub fn mean_value<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a SensorValue>,
{
    values
        .into_iter()
        .map(SensorValue::double_value)
        .collect::<crate::numeric::MeanCalculator>()
        .mean()
}

/// The worst display flag among the values (GOOD for an empty set).
pub fn combined_display_flag<'a, I>(values: I) -> Flag
where
    I: IntoIterator<Item = &'a SensorValue>,
{
    values
        .into_iter()
        .map(SensorValue::display_flag)
        .fold(Flag::Good, Flag::worst_of)
}

/// Non-empty display messages of the values, trimmed and joined with `;`.
pub fn combined_qc_comment<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a SensorValue>,
{
    values
        .into_iter()
        .map(|v| v.display_qc_message().trim().to_string())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(QC_MESSAGE_SEPARATOR)
}

/// `true` if no value has had its user flag set by a human.
pub fn all_user_qc_needed<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a SensorValue>,
{
    values
        .into_iter()
        .all(|v| matches!(v.user_qc_flag(false), Flag::Needed | Flag::AssumedGood))
}

/// JSON object mapping epoch milliseconds to numeric payloads (`null`
/// for missing values), ordered by time.
pub fn date_value_json<'a, I>(values: I) -> serde_json::Result<String>
where
    I: IntoIterator<Item = &'a SensorValue>,
{
    let map: BTreeMap<i64, Option<f64>> = values
        .into_iter()
        .map(|v| {
            let number = v.double_value();
            (v.time().timestamp_millis(), (!number.is_nan()).then_some(number))
        })
        .collect();
    serde_json::to_string(&map)
}

/// Interpolated payload at `time` from the values either side of it. With
/// only one side available, that side's payload is used.
pub fn interpolate_values(
    prior: Option<&SensorValue>,
    post: Option<&SensorValue>,
    time: DateTime<Utc>,
) -> Option<f64> {
    match (prior, post) {
        (Some(a), Some(b)) => Some(interpolate_at(
            a.time(),
            a.double_value(),
            b.time(),
            b.double_value(),
            time,
        )),
        (Some(a), None) => Some(a.double_value()),
        (None, Some(b)) => Some(b.double_value()),
        (None, None) => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
