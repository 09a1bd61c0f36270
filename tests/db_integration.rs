/// Integration tests for PostgreSQL persistence of sensor values
///
/// Tests verify:
/// 1. New values are inserted and receive database ids
/// 2. Reloading a dataset restores payloads and QC state
/// 3. Only dirty values are written on a second save
///
/// Prerequisites:
/// - PostgreSQL reachable through DATABASE_URL (environment or .env)
///
/// Without DATABASE_URL the tests return early.
///
/// Run with: cargo test --test db_integration -- --test-threads=1

use chrono::{Duration, TimeZone, Utc};
use oceanval::db;
use oceanval::flag::Flag;
use oceanval::model::SensorType;
use oceanval::qc::RoutineFlag;
use oceanval::{DatasetSensorValues, SensorAssignments, SensorValue, SensorValuesList};
use postgres::Client;
use std::sync::Arc;

const TEST_DATASET: i64 = -424242;
const SST_COLUMN: i64 = 12;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn setup_test_db() -> Option<Client> {
    dotenv::dotenv().ok();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    }

    let mut client = db::connect().expect("Failed to connect to test database");
    db::create_schema(&mut client).expect("Failed to create schema");
    cleanup_test_data(&mut client);
    Some(client)
}

fn cleanup_test_data(client: &mut Client) {
    let _ = client.execute(
        "DELETE FROM sensor_values WHERE dataset_id = $1",
        &[&TEST_DATASET],
    );
}

fn assignments() -> SensorAssignments {
    let mut assignments = SensorAssignments::new();
    assignments.assign(SST_COLUMN, SensorType::new(1, "Sea Surface Temperature", "SST"));
    assignments
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_save_and_reload_dataset() {
    let Some(mut client) = setup_test_db() else {
        return;
    };

    let start = Utc.with_ymd_and_hms(2023, 5, 2, 12, 0, 0).unwrap();
    let mut store = DatasetSensorValues::new(TEST_DATASET, assignments());
    for m in 0..5 {
        let payload = format!("{}", 15 + m);
        store
            .insert(SensorValue::new(TEST_DATASET, SST_COLUMN, start + Duration::minutes(m), Some(payload.as_str())))
            .unwrap();
    }

    let saved = db::save_sensor_values(&mut client, &mut store).expect("Failed to save values");
    assert_eq!(saved, 5);
    assert!(store.dirty_values().is_empty(), "store should be clean after saving");
    assert!(store.iter().all(|v| v.is_in_database()), "every value should have an id");

    // Flag one value and save again: only that one is written
    let flagged_time = start + Duration::minutes(2);
    store.update(SST_COLUMN, flagged_time, |v| {
        v.add_auto_qc_flag(RoutineFlag::new("SpikeCheck", Flag::Questionable, "< 1.0", "3.2"))
            .expect("value is stored");
    });
    let saved = db::save_sensor_values(&mut client, &mut store).expect("Failed to save update");
    assert_eq!(saved, 1);

    let reloaded = db::load_dataset(&mut client, TEST_DATASET, assignments()).expect("Failed to reload");
    assert_eq!(reloaded.len(), 5);

    let value = reloaded.get(SST_COLUMN, flagged_time).expect("flagged value reloaded");
    assert_eq!(value.user_qc_flag(false), Flag::Needed);
    assert_eq!(value.display_flag(), Flag::Questionable);
    assert_eq!(value.auto_qc().flags().len(), 1);
    assert!(!value.is_dirty(), "loaded values start clean");

    let reloaded = Arc::new(reloaded);
    let mut list = SensorValuesList::for_column(SST_COLUMN, reloaded.clone()).unwrap();
    list.add_all(reloaded.column_values(SST_COLUMN)).unwrap();
    let resolved = list.get_value(flagged_time).unwrap().unwrap();
    assert!(resolved.is_interpolated(), "QUESTIONABLE reading should be interpolated over");
    assert!((resolved.double_value() - 17.0).abs() < 1e-9);

    cleanup_test_data(&mut client);
}
