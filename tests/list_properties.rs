//! Property-based tests for the resolution engine.
//!
//! Run with: cargo test --test list_properties

use chrono::{DateTime, Duration, TimeZone, Utc};
use oceanval::{
    Flag, ListError, MeasurementMode, SensorAssignments, SensorType, SensorValue,
    SensorValuesList,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const COLUMN: i64 = 10;

// =============================================================================
// Helpers and strategies
// =============================================================================

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

fn new_list() -> SensorValuesList {
    let mut assignments = SensorAssignments::new();
    assignments.assign(COLUMN, SensorType::new(1, "Sea Surface Temperature", "SST"));
    SensorValuesList::for_column(COLUMN, Arc::new(assignments)).unwrap()
}

fn good_reading(offset_secs: i64, value: f64) -> SensorValue {
    let payload = value.to_string();
    let time = base() + Duration::seconds(offset_secs);
    let mut reading = SensorValue::new(1, COLUMN, time, Some(payload.as_str()));
    reading.set_user_qc(Flag::Good, "");
    reading
}

/// Arbitrary (offset, value) readings; offsets may repeat.
fn arb_readings(max: usize) -> impl Strategy<Value = Vec<(i64, f64)>> {
    prop::collection::vec((0i64..200_000, -5.0f64..35.0), 0..max)
}

/// Evenly spaced readings, `spacing` seconds apart.
fn arb_regular_series() -> impl Strategy<Value = (i64, Vec<f64>)> {
    (1i64..=300, prop::collection::vec(-5.0f64..35.0, 2..60))
}

// =============================================================================
// Ingestion
// =============================================================================

proptest! {
    /// Whatever the insertion order, members end up strictly ascending and
    /// every distinct timestamp is kept once.
    #[test]
    fn raw_values_sorted_and_unique(readings in arb_readings(80)) {
        let mut list = new_list();
        let mut distinct = BTreeSet::new();

        for (offset, value) in &readings {
            let result = list.add(good_reading(*offset, *value));
            if distinct.insert(*offset) {
                prop_assert!(result.is_ok());
            } else {
                let is_duplicate = matches!(result, Err(ListError::DuplicateTimestamp(_)));
                prop_assert!(is_duplicate);
            }
        }

        let times = list.raw_times();
        prop_assert_eq!(times.len(), distinct.len());
        prop_assert!(times.windows(2).all(|w| w[0] < w[1]));
        for offset in &distinct {
            prop_assert!(list.contains_time(base() + Duration::seconds(*offset)));
        }
    }

    /// A rejected duplicate leaves the list exactly as it was.
    #[test]
    fn duplicate_add_does_not_mutate(readings in arb_readings(40), pick in any::<prop::sample::Index>()) {
        prop_assume!(!readings.is_empty());
        let mut list = new_list();
        for (offset, value) in &readings {
            let _ = list.add(good_reading(*offset, *value));
        }

        let before: Vec<_> = list.raw_values().iter().map(|v| (v.time(), v.value().map(String::from))).collect();
        let (offset, _) = readings[pick.index(readings.len())];
        prop_assert!(list.add(good_reading(offset, 999.0)).is_err());
        let after: Vec<_> = list.raw_values().iter().map(|v| (v.time(), v.value().map(String::from))).collect();
        prop_assert_eq!(before, after);
    }
}

// =============================================================================
// Classification and derived values
// =============================================================================

proptest! {
    /// Regularly spaced series within the continuity limit are continuous,
    /// with one derived value per reading.
    #[test]
    fn regular_series_is_continuous((spacing, values) in arb_regular_series()) {
        let mut list = new_list();
        for (i, value) in values.iter().enumerate() {
            list.add(good_reading(i as i64 * spacing, *value)).unwrap();
        }

        prop_assert_eq!(list.measurement_mode(), MeasurementMode::Continuous);
        prop_assert_eq!(list.values_size().unwrap(), values.len());
    }

    /// An exact GOOD reading is returned as stored.
    #[test]
    fn exact_good_lookup((spacing, values) in arb_regular_series(), pick in any::<prop::sample::Index>()) {
        let mut list = new_list();
        for (i, value) in values.iter().enumerate() {
            list.add(good_reading(i as i64 * spacing, *value)).unwrap();
        }

        let i = pick.index(values.len());
        let time = base() + Duration::seconds(i as i64 * spacing);
        let found = list.get_value(time).unwrap().expect("exact reading exists");
        prop_assert_eq!(found.time(), time);
        prop_assert!(!found.is_interpolated());
        prop_assert_eq!(found.double_value(), values[i].to_string().parse::<f64>().unwrap());
    }

    /// Interpolating between two GOOD neighbours stays between them.
    #[test]
    fn interpolation_is_bounded(values in prop::collection::vec(-5.0f64..35.0, 2..40), frac in 0.01f64..0.99) {
        let mut list = new_list();
        for (i, value) in values.iter().enumerate() {
            list.add(good_reading(i as i64 * 120, *value)).unwrap();
        }

        let stored: Vec<f64> = list.raw_values().iter().map(|v| v.double_value()).collect();
        let step = ((values.len() - 1) as f64 * frac) as usize;
        let offset_millis = ((frac * 120_000.0) as i64).clamp(1, 119_999);
        let time = base() + Duration::seconds(step as i64 * 120) + Duration::milliseconds(offset_millis);

        let value = list.get_value(time).unwrap().expect("neighbours are within the limit");
        let (low, high) = if stored[step] <= stored[step + 1] {
            (stored[step], stored[step + 1])
        } else {
            (stored[step + 1], stored[step])
        };
        prop_assert!(value.double_value() >= low - 1e-9 && value.double_value() <= high + 1e-9);
        prop_assert!(value.is_interpolated());
    }

    /// Bursts separated by long gaps are periodic, one value per burst, and
    /// group spans never overlap.
    #[test]
    fn bursts_give_ordered_groups(bursts in 2usize..8, size in 1usize..10, gap_hours in 1i64..12) {
        let mut list = new_list();
        for b in 0..bursts {
            for i in 0..size {
                let offset = b as i64 * gap_hours * 3600 + i as i64 * 10;
                list.add(good_reading(offset, (b * 10 + i) as f64)).unwrap();
            }
        }

        prop_assert_eq!(list.measurement_mode(), MeasurementMode::Periodic);
        let values = list.values().unwrap();
        prop_assert_eq!(values.len(), bursts);
        prop_assert!(values.windows(2).all(|w| w[0].end_time() < w[1].start_time()));
        prop_assert!(values.iter().all(|v| v.start_time() <= v.time() && v.time() <= v.end_time()));
    }

    /// Asking twice gives the same answer.
    #[test]
    fn queries_are_idempotent(readings in arb_readings(60), probe in 0i64..200_000) {
        let mut list = new_list();
        for (offset, value) in &readings {
            let _ = list.add(good_reading(*offset, *value));
        }

        let time = base() + Duration::seconds(probe);
        let first = list.get_value(time).unwrap();
        let second = list.get_value(time).unwrap();
        prop_assert_eq!(first, second);

        let first_range = list.get_value_in_range(time, time + Duration::hours(1)).unwrap();
        let second_range = list.get_value_in_range(time, time + Duration::hours(1)).unwrap();
        prop_assert_eq!(first_range, second_range);
    }
}
