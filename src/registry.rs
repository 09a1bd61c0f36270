/// Registry of lists, one per sensor type.
///
/// Columns sharing a sensor type are resolved together, so the registry
/// groups the instrument's columns by sensor type and routes each new
/// reading to the list for its column.
use crate::config::ResolutionConfig;
use crate::error::{ListError, Result};
use crate::list::SensorValuesList;
use crate::model::{ColumnId, SensorType};
use crate::sensor_value::SharedSensorValue;
use crate::store::SharedContext;
use std::collections::{BTreeMap, HashMap};

pub struct ListRegistry {
    lists: BTreeMap<SensorType, SensorValuesList>,
    column_types: HashMap<ColumnId, SensorType>,
}

impl ListRegistry {
    /// One list per distinct sensor type among `columns`.
    pub fn new<I>(context: SharedContext, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = ColumnId>,
    {
        Self::with_config(context, columns, ResolutionConfig::default())
    }

    pub fn with_config<I>(context: SharedContext, columns: I, config: ResolutionConfig) -> Result<Self>
    where
        I: IntoIterator<Item = ColumnId>,
    {
        config.validate()?;
        let mut grouped: BTreeMap<SensorType, Vec<ColumnId>> = BTreeMap::new();
        let mut column_types = HashMap::new();
        for column in columns {
            let sensor_type = context.sensor_type(column)?;
            grouped.entry(sensor_type.clone()).or_default().push(column);
            column_types.insert(column, sensor_type);
        }

        let mut lists = BTreeMap::new();
        for (sensor_type, columns) in grouped {
            let list = SensorValuesList::with_config(columns, context.clone(), config)?;
            lists.insert(sensor_type, list);
        }

        log::info!(
            target: "list",
            "registry created: {} sensor types over {} columns",
            lists.len(),
            column_types.len()
        );

        Ok(ListRegistry { lists, column_types })
    }

    /// Adds a reading to the list for its column.
    pub fn add(&mut self, value: impl Into<SharedSensorValue>) -> Result<()> {
        let value = value.into();
        let column = value.column_id();
        let list = self
            .column_types
            .get(&column)
            .and_then(|sensor_type| self.lists.get_mut(sensor_type))
            .ok_or(ListError::UnknownColumn(column))?;
        list.add(value)
    }

    /// Adds readings in order, stopping at the first failure.
    pub fn add_all<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<SharedSensorValue>,
    {
        for value in values {
            self.add(value)?;
        }
        Ok(())
    }

    pub fn get(&self, sensor_type: &SensorType) -> Option<&SensorValuesList> {
        self.lists.get(sensor_type)
    }

    pub fn get_mut(&mut self, sensor_type: &SensorType) -> Option<&mut SensorValuesList> {
        self.lists.get_mut(sensor_type)
    }

    /// The list a column's readings go to.
    pub fn list_for_column(&mut self, column: ColumnId) -> Option<&mut SensorValuesList> {
        let sensor_type = self.column_types.get(&column)?;
        self.lists.get_mut(sensor_type)
    }

    pub fn sensor_types(&self) -> impl Iterator<Item = &SensorType> {
        self.lists.keys()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SensorType, &SensorValuesList)> {
        self.lists.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SensorType, &mut SensorValuesList)> {
        self.lists.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::Flag;
    use crate::list::MeasurementMode;
    use crate::sensor_value::SensorValue;
    use crate::store::SensorAssignments;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn sst() -> SensorType {
        SensorType::new(1, "Sea Surface Temperature", "SST")
    }

    fn salinity() -> SensorType {
        SensorType::new(2, "Salinity", "SAL")
    }

    fn registry() -> ListRegistry {
        let mut assignments = SensorAssignments::new();
        assignments.assign(10, sst());
        assignments.assign(11, sst());
        assignments.assign(20, salinity());
        ListRegistry::new(Arc::new(assignments), [10, 11, 20]).unwrap()
    }

    #[test]
    fn test_columns_grouped_by_sensor_type() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        let types: Vec<_> = registry.sensor_types().cloned().collect();
        assert_eq!(types, vec![sst(), salinity()]);
        let sst_columns: Vec<_> = registry.get(&sst()).unwrap().column_ids().collect();
        assert_eq!(sst_columns, vec![10, 11]);
    }

    #[test]
    fn test_add_routes_by_column() {
        let mut registry = registry();
        let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        registry.add(SensorValue::new(1, 10, t0, Some("12.1"))).unwrap();
        registry.add(SensorValue::new(1, 11, t0 + Duration::minutes(1), Some("12.3"))).unwrap();
        registry.add(SensorValue::new(1, 20, t0, Some("35.0"))).unwrap();

        assert_eq!(registry.get(&sst()).unwrap().raw_size(), 2);
        assert_eq!(registry.get(&salinity()).unwrap().raw_size(), 1);

        let list = registry.get_mut(&sst()).unwrap();
        assert_eq!(list.measurement_mode(), MeasurementMode::Continuous);
        let value = list.get_value(t0).unwrap().unwrap();
        assert_eq!(value.flag(), Flag::AssumedGood);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let mut registry = registry();
        let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let result = registry.add(SensorValue::new(1, 30, t0, Some("1")));
        assert!(matches!(result, Err(ListError::UnknownColumn(30))));
        assert!(registry.list_for_column(30).is_none());
        assert!(registry.list_for_column(20).is_some());
    }

    #[test]
    fn test_invalid_config_rejected_even_without_columns() {
        let config = crate::config::ResolutionConfig {
            continuous_limit_secs: -5,
            ..Default::default()
        };
        let result = ListRegistry::with_config(Arc::new(SensorAssignments::new()), Vec::new(), config);
        assert!(matches!(result, Err(ListError::Config(_))));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ListRegistry::new(Arc::new(SensorAssignments::new()), Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }
}
