//! The per-sensor resolution engine.
//!
//! A [`SensorValuesList`] holds the raw readings of one sensor type (from
//! one or more columns) in time order. On the first query it classifies
//! the series as CONTINUOUS or PERIODIC, reduces the readings to
//! [`SensorValuesListValue`]s accordingly, and answers point and range
//! queries against those. Any mutation invalidates the derived state,
//! which is rebuilt lazily on the next query.

mod build;
mod mode;
mod query;
mod value;

pub use mode::{classify, MeasurementMode};
pub use value::{ListValueData, SensorValuesListValue};

use crate::config::ResolutionConfig;
use crate::error::{ListError, Result};
use crate::model::{ColumnId, SensorType};
use crate::sensor_value::{SensorValue, SharedSensorValue};
use crate::store::SharedContext;
use build::BuildContext;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// State of a lazily computed cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never computed.
    Absent,
    /// Computed once, invalidated since.
    Stale,
    Fresh,
}

#[derive(Debug, Clone)]
enum Cache<T> {
    Absent,
    Stale,
    Fresh(T),
}

impl<T> Cache<T> {
    fn state(&self) -> CacheState {
        match self {
            Cache::Absent => CacheState::Absent,
            Cache::Stale => CacheState::Stale,
            Cache::Fresh(_) => CacheState::Fresh,
        }
    }

    fn invalidate(&mut self) {
        if matches!(self, Cache::Fresh(_)) {
            *self = Cache::Stale;
        }
    }

    fn get_or_try_build<E>(
        &mut self,
        build: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<&T, E> {
        if !matches!(self, Cache::Fresh(_)) {
            *self = Cache::Fresh(build()?);
        }
        match self {
            Cache::Fresh(value) => Ok(value),
            Cache::Absent | Cache::Stale => unreachable!("cache filled above"),
        }
    }
}

/// Derived values and their timestamps, built together.
#[derive(Debug, Clone)]
struct Derived {
    values: Vec<SensorValuesListValue>,
    times: Vec<DateTime<Utc>>,
}

impl Derived {
    fn new(values: Vec<SensorValuesListValue>) -> Self {
        let times = values.iter().map(SensorValuesListValue::time).collect();
        Derived { values, times }
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

pub struct SensorValuesList {
    columns: BTreeSet<ColumnId>,
    sensor_type: SensorType,
    context: SharedContext,
    config: ResolutionConfig,
    members: Vec<SharedSensorValue>,
    mode: Cache<MeasurementMode>,
    derived: Cache<Derived>,
}

impl SensorValuesList {
    /// An empty list for the given columns, which must all share one
    /// sensor type.
    pub fn new<I>(columns: I, context: SharedContext) -> Result<Self>
    where
        I: IntoIterator<Item = ColumnId>,
    {
        Self::with_config(columns, context, ResolutionConfig::default())
    }

    /// As [`SensorValuesList::new`], with explicit resolution settings.
    /// Settings that fail validation are rejected.
    pub fn with_config<I>(columns: I, context: SharedContext, config: ResolutionConfig) -> Result<Self>
    where
        I: IntoIterator<Item = ColumnId>,
    {
        config.validate()?;
        let columns: BTreeSet<ColumnId> = columns.into_iter().collect();
        let Some(&first) = columns.first() else {
            return Err(ListError::NoColumns);
        };

        let sensor_type = context.sensor_type(first)?;
        for &column in columns.iter().skip(1) {
            let found = context.sensor_type(column)?;
            if found != sensor_type {
                return Err(ListError::MixedSensorTypes {
                    column,
                    expected: sensor_type.name.clone(),
                    found: found.name,
                });
            }
        }

        log::debug!(
            target: "list",
            "created list for {} on columns {:?}",
            sensor_type,
            columns
        );

        Ok(SensorValuesList {
            columns,
            sensor_type,
            context,
            config,
            members: Vec::new(),
            mode: Cache::Absent,
            derived: Cache::Absent,
        })
    }

    /// A list for a single column.
    pub fn for_column(column: ColumnId, context: SharedContext) -> Result<Self> {
        Self::new([column], context)
    }

    /// A list built from existing values. Its columns are those the
    /// values come from.
    pub fn from_values<I>(values: I, context: SharedContext) -> Result<Self>
    where
        I: IntoIterator<Item = SharedSensorValue>,
    {
        let values: Vec<SharedSensorValue> = values.into_iter().collect();
        let mut list = Self::new(values.iter().map(|v| v.column_id()), context)?;
        list.add_all(values)?;
        Ok(list)
    }

    pub fn sensor_type(&self) -> &SensorType {
        &self.sensor_type
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.columns.iter().copied()
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Adds a reading.
    ///
    /// Fails if the reading's column does not belong to this list or a
    /// member already exists at its timestamp; the list is unchanged in
    /// either case.
    pub fn add(&mut self, value: impl Into<SharedSensorValue>) -> Result<()> {
        let value = value.into();
        if !self.columns.contains(&value.column_id()) {
            return Err(ListError::UnknownColumn(value.column_id()));
        }

        let time = value.time();
        let after_last = self.members.last().is_none_or(|last| last.time() < time);
        if after_last {
            self.members.push(value);
        } else {
            match self.members.binary_search_by_key(&time, |m| m.time()) {
                Ok(_) => return Err(ListError::DuplicateTimestamp(time)),
                Err(index) => self.members.insert(index, value),
            }
        }

        self.invalidate();
        Ok(())
    }

    /// Adds readings in order, stopping at the first failure. Readings
    /// added before the failure stay in the list.
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

    /// Adds every member of another list.
    pub fn add_all_from_list(&mut self, other: &SensorValuesList) -> Result<()> {
        self.add_all(other.members.iter().cloned())
    }

    /// Removes the member with the same identity as `value`. Returns
    /// whether anything was removed.
    pub fn remove(&mut self, value: &SensorValue) -> bool {
        let Ok(index) = self.members.binary_search_by_key(&value.time(), |m| m.time()) else {
            return false;
        };
        if *self.members[index] != *value {
            return false;
        }

        self.members.remove(index);
        self.invalidate();
        true
    }

    fn invalidate(&mut self) {
        self.mode.invalidate();
        self.derived.invalidate();
    }

    // -----------------------------------------------------------------------
    // Raw members
    // -----------------------------------------------------------------------

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn raw_size(&self) -> usize {
        self.members.len()
    }

    /// All members in time order.
    pub fn raw_values(&self) -> &[SharedSensorValue] {
        &self.members
    }

    pub fn raw_times(&self) -> Vec<DateTime<Utc>> {
        self.members.iter().map(|m| m.time()).collect()
    }

    /// The member at exactly `time`.
    pub fn raw_sensor_value(&self, time: DateTime<Utc>) -> Option<&SharedSensorValue> {
        self.raw_index(time).ok().map(|i| &self.members[i])
    }

    pub fn contains_time(&self, time: DateTime<Utc>) -> bool {
        self.raw_index(time).is_ok()
    }

    fn raw_index(&self, time: DateTime<Utc>) -> std::result::Result<usize, usize> {
        self.members.binary_search_by_key(&time, |m| m.time())
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    /// The measurement mode, classifying the members if needed.
    pub fn measurement_mode(&mut self) -> MeasurementMode {
        if let Cache::Fresh(mode) = self.mode {
            return mode;
        }

        let mode = classify(&self.raw_times(), &self.config);
        log::debug!(
            target: "list",
            "{} classified as {} ({} values)",
            self.sensor_type,
            mode,
            self.members.len()
        );
        self.mode = Cache::Fresh(mode);
        mode
    }

    pub fn mode_cache_state(&self) -> CacheState {
        self.mode.state()
    }

    pub fn values_cache_state(&self) -> CacheState {
        self.derived.state()
    }

    fn derived(&mut self) -> Result<&Derived> {
        let mode = self.measurement_mode();
        let members = &self.members;
        let ctx = BuildContext {
            sensor_type: &self.sensor_type,
            context: self.context.as_ref(),
            config: &self.config,
        };

        let derived = self.derived.get_or_try_build(|| {
            build::build_values(members, mode, &ctx)
                .map(Derived::new)
                .inspect(|d| {
                    log::debug!(
                        target: "list",
                        "built {} {} values from {} members",
                        d.values.len(),
                        ctx.sensor_type,
                        members.len()
                    )
                })
                .inspect_err(|e| {
                    log::warn!(target: "list", "could not build {} values: {}", ctx.sensor_type, e)
                })
        })?;
        Ok(derived)
    }

    /// The derived values, in time order.
    pub fn values(&mut self) -> Result<&[SensorValuesListValue]> {
        Ok(&self.derived()?.values)
    }

    pub fn values_size(&mut self) -> Result<usize> {
        Ok(self.derived()?.values.len())
    }

    /// Timestamps of the derived values.
    pub fn value_times(&mut self) -> Result<&[DateTime<Utc>]> {
        Ok(&self.derived()?.times)
    }
}

impl fmt::Debug for SensorValuesList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorValuesList")
            .field("sensor_type", &self.sensor_type)
            .field("columns", &self.columns)
            .field("members", &self.members.len())
            .field("mode", &self.mode.state())
            .field("derived", &self.derived.state())
            .finish()
    }
}
