/// Dataset-wide value store and sensor-type lookup.
///
/// A [`crate::list::SensorValuesList`] needs two things from the world
/// outside it: the sensor type of each column it is built for, and the
/// QC message to report for a value (which, for position QC, lives on a
/// different column). Both are provided through the [`DatasetContext`]
/// trait so lists never see how values are stored.
///
/// [`DatasetSensorValues`] is the in-memory implementation: it owns every
/// value of one dataset, keyed by column and time, and hands out shared
/// references.
use crate::error::StoreError;
use crate::model::{
    is_position_column, ColumnId, DatasetId, SensorType, LONGITUDE_COLUMN_ID,
    POSITION_QC_PREFIX, QC_MESSAGE_SEPARATOR,
};
use crate::sensor_value::{SensorValue, SharedSensorValue};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Context trait
// ---------------------------------------------------------------------------

/// What a list may ask of its dataset.
pub trait DatasetContext {
    /// The sensor type assigned to a column.
    fn sensor_type(&self, column_id: ColumnId) -> Result<SensorType, StoreError>;

    /// The QC message to report for `value`. With `ignore_position`,
    /// position QC messages are left out.
    fn qc_message(&self, value: &SensorValue, ignore_position: bool) -> String {
        if value.flag_needed() {
            value.auto_qc().all_messages()
        } else {
            value.user_qc_message(ignore_position)
        }
    }
}

/// Handle to a dataset context shared read-only between lists.
pub type SharedContext = Arc<dyn DatasetContext + Send + Sync>;

// ---------------------------------------------------------------------------
// Sensor assignments
// ---------------------------------------------------------------------------

/// One column → sensor type assignment, as written in configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnAssignment {
    pub column_id: ColumnId,
    pub sensor_type: SensorType,
}

/// Column id → sensor type lookup for one instrument.
#[derive(Debug, Clone, Default)]
pub struct SensorAssignments {
    columns: HashMap<ColumnId, SensorType>,
}

impl SensorAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = ColumnAssignment>>(entries: I) -> Self {
        let mut assignments = SensorAssignments::new();
        for entry in entries {
            assignments.assign(entry.column_id, entry.sensor_type);
        }
        assignments
    }

    /// Assigns a column, replacing any earlier assignment.
    pub fn assign(&mut self, column_id: ColumnId, sensor_type: SensorType) {
        self.columns.insert(column_id, sensor_type);
    }

    pub fn sensor_type_for_column(&self, column_id: ColumnId) -> Result<&SensorType, StoreError> {
        self.columns
            .get(&column_id)
            .ok_or(StoreError::UnknownColumn(column_id))
    }

    /// Columns assigned to `sensor_type`, in ascending id order.
    pub fn columns_for(&self, sensor_type: &SensorType) -> Vec<ColumnId> {
        let mut columns: Vec<ColumnId> = self
            .columns
            .iter()
            .filter(|(_, t)| *t == sensor_type)
            .map(|(c, _)| *c)
            .collect();
        columns.sort_unstable();
        columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl DatasetContext for SensorAssignments {
    fn sensor_type(&self, column_id: ColumnId) -> Result<SensorType, StoreError> {
        self.sensor_type_for_column(column_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Dataset store
// ---------------------------------------------------------------------------

/// All sensor values of one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSensorValues {
    dataset_id: DatasetId,
    assignments: SensorAssignments,
    values: BTreeMap<ColumnId, BTreeMap<DateTime<Utc>, SharedSensorValue>>,
}

impl DatasetSensorValues {
    pub fn new(dataset_id: DatasetId, assignments: SensorAssignments) -> Self {
        DatasetSensorValues {
            dataset_id,
            assignments,
            values: BTreeMap::new(),
        }
    }

    pub fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    pub fn assignments(&self) -> &SensorAssignments {
        &self.assignments
    }

    /// Adds a value. Fails if it belongs to another dataset or if the
    /// column already has a value at that time.
    pub fn insert(&mut self, value: SensorValue) -> Result<SharedSensorValue, StoreError> {
        self.check_dataset(&value)?;

        let column = self.values.entry(value.column_id()).or_default();
        if column.contains_key(&value.time()) {
            return Err(StoreError::DuplicateValue {
                column: value.column_id(),
                time: value.time(),
            });
        }

        let shared = Arc::new(value);
        column.insert(shared.time(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Adds or replaces a value, returning the one it replaced.
    pub fn replace(&mut self, value: SensorValue) -> Result<Option<SharedSensorValue>, StoreError> {
        self.check_dataset(&value)?;
        Ok(self
            .values
            .entry(value.column_id())
            .or_default()
            .insert(value.time(), Arc::new(value)))
    }

    /// Applies `update` to the stored value at (column, time). Lists built
    /// earlier keep the value as it was. Returns `false` if there is no
    /// such value.
    pub fn update<F>(&mut self, column_id: ColumnId, time: DateTime<Utc>, update: F) -> bool
    where
        F: FnOnce(&mut SensorValue),
    {
        match self.values.get_mut(&column_id).and_then(|c| c.get_mut(&time)) {
            Some(shared) => {
                update(Arc::make_mut(shared));
                true
            }
            None => false,
        }
    }

    pub fn get(&self, column_id: ColumnId, time: DateTime<Utc>) -> Option<&SharedSensorValue> {
        self.values.get(&column_id).and_then(|c| c.get(&time))
    }

    /// Values of one column in time order.
    pub fn column_values(&self, column_id: ColumnId) -> Vec<SharedSensorValue> {
        self.values
            .get(&column_id)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.values.keys().copied().collect()
    }

    /// Every value, column by column.
    pub fn iter(&self) -> impl Iterator<Item = &SharedSensorValue> {
        self.values.values().flat_map(|c| c.values())
    }

    /// Values that have changed since they were last saved.
    pub fn dirty_values(&self) -> Vec<SharedSensorValue> {
        self.iter()
            .filter(|v| v.is_dirty() && v.can_be_saved())
            .cloned()
            .collect()
    }

    pub fn clear_dirty_flags(&mut self) {
        for column in self.values.values_mut() {
            for value in column.values_mut() {
                if value.is_dirty() {
                    Arc::make_mut(value).clear_dirty();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dataset(&self, value: &SensorValue) -> Result<(), StoreError> {
        if value.dataset_id() != self.dataset_id {
            return Err(StoreError::WrongDataset {
                expected: self.dataset_id,
                found: value.dataset_id(),
            });
        }
        Ok(())
    }
}

impl DatasetContext for DatasetSensorValues {
    fn sensor_type(&self, column_id: ColumnId) -> Result<SensorType, StoreError> {
        self.assignments.sensor_type(column_id)
    }

    /// Position QC is owned by the longitude column. When a value carries
    /// position QC, its position message parts are replaced by the ones
    /// currently held on the longitude value at the same time.
    fn qc_message(&self, value: &SensorValue, ignore_position: bool) -> String {
        if value.flag_needed() {
            return value.auto_qc().all_messages();
        }

        if ignore_position || !value.has_position_qc() || is_position_column(value.column_id()) {
            return value.user_qc_message(ignore_position);
        }

        let Some(position) = self.get(LONGITUDE_COLUMN_ID, value.time()) else {
            log::debug!(
                target: "store",
                "no position value at {} for column {}",
                value.time(),
                value.column_id()
            );
            return value.user_qc_message(false);
        };

        let own = value.user_qc_message(false);
        let position_message = position.user_qc_message(false);

        own.split(QC_MESSAGE_SEPARATOR)
            .filter(|part| !part.starts_with(POSITION_QC_PREFIX))
            .chain(
                position_message
                    .split(QC_MESSAGE_SEPARATOR)
                    .filter(|part| part.starts_with(POSITION_QC_PREFIX)),
            )
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(QC_MESSAGE_SEPARATOR)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::Flag;
    use crate::qc::RoutineFlag;
    use crate::sensor_value::SensorValueRecord;
    use chrono::TimeZone;

    fn sst() -> SensorType {
        SensorType::new(1, "Sea Surface Temperature", "SST")
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 7, 14, 6, minute, 0).unwrap()
    }

    fn stored(column: ColumnId, minute: u32, value: &str) -> SensorValue {
        SensorValue::from(SensorValueRecord {
            id: 1 + minute as i64,
            dataset_id: 9,
            column_id: column,
            time: at(minute),
            value: Some(value.to_string()),
            auto_qc: Default::default(),
            user_qc_flag: Flag::AssumedGood,
            user_qc_message: None,
        })
    }

    fn store() -> DatasetSensorValues {
        let mut assignments = SensorAssignments::new();
        assignments.assign(10, sst());
        assignments.assign(11, sst());
        assignments.assign(LONGITUDE_COLUMN_ID, SensorType::new(90, "Longitude", "LON"));
        DatasetSensorValues::new(9, assignments)
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let store = store();
        assert_eq!(store.sensor_type(10), Ok(sst()));
        assert_eq!(store.sensor_type(99), Err(StoreError::UnknownColumn(99)));
    }

    #[test]
    fn test_columns_for_sensor_type_are_sorted() {
        let store = store();
        assert_eq!(store.assignments().columns_for(&sst()), vec![10, 11]);
    }

    #[test]
    fn test_insert_rejects_duplicates_and_foreign_datasets() {
        let mut store = store();
        store.insert(stored(10, 0, "1")).unwrap();
        assert!(matches!(
            store.insert(stored(10, 0, "2")),
            Err(StoreError::DuplicateValue { column: 10, .. })
        ));
        let foreign = SensorValue::new(3, 10, at(1), Some("1"));
        assert_eq!(
            store.insert(foreign).unwrap_err(),
            StoreError::WrongDataset { expected: 9, found: 3 }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_does_not_touch_previously_shared_values() {
        let mut store = store();
        let shared = store.insert(stored(10, 0, "1")).unwrap();
        assert!(store.update(10, at(0), |v| {
            v.set_user_qc(Flag::Bad, "Sensor fouled");
        }));
        assert_eq!(shared.user_qc_flag(false), Flag::AssumedGood);
        assert_eq!(store.get(10, at(0)).unwrap().user_qc_flag(false), Flag::Bad);
        assert!(!store.update(10, at(5), |_| {}));
    }

    #[test]
    fn test_dirty_values_and_clearing() {
        let mut store = store();
        store.insert(stored(10, 0, "1")).unwrap();
        store.insert(SensorValue::new(9, 10, at(1), Some("2"))).unwrap();
        assert_eq!(store.dirty_values().len(), 1);
        store.clear_dirty_flags();
        assert!(store.dirty_values().is_empty());
    }

    #[test]
    fn test_position_message_resolved_from_longitude() {
        let mut store = store();
        // The SST value still carries the wording from an earlier position QC run.
        let mut sst_value = stored(10, 0, "15.2");
        sst_value.set_position_qc(Flag::Bad, "Old reason");
        let mut lon = stored(LONGITUDE_COLUMN_ID, 0, "-4.1");
        lon.set_position_qc(Flag::Bad, "On land");

        store.insert(lon).unwrap();
        let shared = store.insert(sst_value).unwrap();

        assert_eq!(store.qc_message(&shared, false), "Position: On land");
        assert_eq!(store.qc_message(&shared, true), "");
    }

    #[test]
    fn test_needed_value_reports_auto_qc_messages() {
        let store = store();
        let mut value = stored(10, 0, "40");
        value
            .add_auto_qc_flag(RoutineFlag::new("Range", Flag::Bad, "", ""))
            .unwrap();
        assert_eq!(store.qc_message(&value, false), "Range");
    }
}
