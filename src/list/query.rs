//! Point and range queries against a list's derived values.

use super::build::aggregate_numeric;
use super::mode::MeasurementMode;
use super::value::SensorValuesListValue;
use super::SensorValuesList;
use crate::error::Result;
use crate::numeric::seconds_between;
use crate::sensor_value::SharedSensorValue;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

impl SensorValuesList {
    /// The best value available at `time`.
    ///
    /// For a CONTINUOUS list, a GOOD value at exactly `time` is returned
    /// as is. Otherwise the nearest usable values on either side (within
    /// the continuous limit) are interpolated, and the result is preferred
    /// over an exact match with a worse flag.
    ///
    /// For a PERIODIC list, a group whose span covers `time` is returned
    /// re-timed to `time`; otherwise the neighbouring groups are used.
    pub fn get_value(&mut self, time: DateTime<Utc>) -> Result<Option<SensorValuesListValue>> {
        let mode = self.measurement_mode();
        let limit = self.config.continuous_limit_secs;
        let derived = self.derived()?;

        let result = match mode {
            MeasurementMode::Continuous => continuous_value(&derived.values, &derived.times, time, limit),
            MeasurementMode::Periodic => periodic_value(&derived.values, time),
        };
        Ok(result)
    }

    /// The derived value at `time`, or the last one before it. No time
    /// limit applies.
    pub fn get_value_on_or_before(
        &mut self,
        time: DateTime<Utc>,
    ) -> Result<Option<SensorValuesListValue>> {
        let derived = self.derived()?;
        let index = match derived.times.binary_search(&time) {
            Ok(index) => Some(index),
            Err(index) => index.checked_sub(1),
        };
        Ok(index.map(|i| derived.values[i].clone()))
    }

    /// A single value summarising every member between `start` and `end`
    /// inclusive.
    ///
    /// Only CONTINUOUS lists support range queries; a PERIODIC list
    /// always returns `None`.
    pub fn get_value_in_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<SensorValuesListValue>> {
        if self.measurement_mode() == MeasurementMode::Periodic {
            log::debug!(target: "list", "range query on periodic {} list ignored", self.sensor_type);
            return Ok(None);
        }

        let first = self.members.partition_point(|m| m.time() < start);
        let last = self.members.partition_point(|m| m.time() <= end);
        if first >= last {
            return Ok(None);
        }

        let in_range: Vec<SharedSensorValue> = self.members[first..last]
            .iter()
            .filter(|m| !m.no_value() && !m.is_flushing())
            .cloned()
            .collect();
        if in_range.is_empty() {
            return Ok(None);
        }

        let value = aggregate_numeric(&in_range, &self.sensor_type, self.context.as_ref())?;
        Ok(Some(value))
    }

    /// The member at exactly `time`, or else the members immediately
    /// before and after it. No time limit applies.
    pub fn get_closest_sensor_values(&self, time: DateTime<Utc>) -> Vec<SharedSensorValue> {
        match self.raw_index(time) {
            Ok(index) => vec![self.members[index].clone()],
            Err(index) => {
                let before = index.checked_sub(1).map(|i| &self.members[i]);
                let after = self.members.get(index);
                before.into_iter().chain(after).cloned().collect()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Continuous lookup
// ---------------------------------------------------------------------------

fn continuous_value(
    values: &[SensorValuesListValue],
    times: &[DateTime<Utc>],
    time: DateTime<Utc>,
    limit_secs: i64,
) -> Option<SensorValuesListValue> {
    let search = times.binary_search(&time);

    let exact = search.ok().map(|i| &values[i]);
    if let Some(exact) = exact {
        if exact.flag().is_good() {
            return Some(exact.clone());
        }
    }

    let (prior_end, post_start) = match search {
        Ok(index) => (index, index + 1),
        Err(index) => (index, index),
    };

    let prior = nearest_usable(values, (0..prior_end).rev(), time, limit_secs);
    let post = nearest_usable(values, post_start..values.len(), time, limit_secs);

    match (exact, best_or_interpolate(prior, post, time)) {
        (None, interpolated) => interpolated,
        (Some(exact), None) => Some(exact.clone()),
        (Some(exact), Some(interpolated)) => {
            if exact.flag().worse_class_than(interpolated.flag()) {
                Some(interpolated)
            } else {
                Some(exact.clone())
            }
        }
    }
}

/// Walks `indices` away from `time` until the limit is passed. Returns the
/// first GOOD value found, or failing that the value with the least
/// significant flag seen.
fn nearest_usable<'a>(
    values: &'a [SensorValuesListValue],
    indices: impl Iterator<Item = usize>,
    time: DateTime<Utc>,
    limit_secs: i64,
) -> Option<&'a SensorValuesListValue> {
    let mut fallback: Option<&SensorValuesListValue> = None;

    for index in indices {
        let candidate = &values[index];
        if seconds_between(time, candidate.time()).abs() > limit_secs {
            break;
        }
        if candidate.flag().is_good() {
            return Some(candidate);
        }
        if fallback.is_none_or(|f| f.flag().more_significant_than(candidate.flag())) {
            fallback = Some(candidate);
        }
    }

    fallback
}

// ---------------------------------------------------------------------------
// Periodic lookup
// ---------------------------------------------------------------------------

fn periodic_value(values: &[SensorValuesListValue], time: DateTime<Utc>) -> Option<SensorValuesListValue> {
    let search = values.binary_search_by(|group| {
        if group.end_time() < time {
            Ordering::Less
        } else if group.start_time() > time {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });

    match search {
        Ok(index) => Some(values[index].retimed(time)),
        Err(index) => {
            let prior = index.checked_sub(1).map(|i| &values[i]);
            let post = values.get(index);
            best_or_interpolate(prior, post, time)
        }
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Combines the values either side of `time`. A lone side, or the side
/// with the better quality class, stands in for `time`; sides in the same
/// class are interpolated.
fn best_or_interpolate(
    prior: Option<&SensorValuesListValue>,
    post: Option<&SensorValuesListValue>,
    time: DateTime<Utc>,
) -> Option<SensorValuesListValue> {
    match (prior, post) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.interpolated_at(time)),
        (Some(prior), Some(post)) => {
            if post.flag().worse_class_than(prior.flag()) {
                Some(prior.interpolated_at(time))
            } else if prior.flag().worse_class_than(post.flag()) {
                Some(post.interpolated_at(time))
            } else {
                Some(SensorValuesListValue::interpolate(prior, post, time))
            }
        }
    }
}
