/// PostgreSQL persistence for sensor values.
///
/// Values live in a single `sensor_values` table keyed by dataset, column
/// and time. Automatic QC is stored as JSON text and flags as their
/// integer codes. Loading builds a [`DatasetSensorValues`]; saving writes
/// back only values that changed since they were loaded.

use crate::error::DbError;
use crate::flag::Flag;
use crate::model::{ColumnId, DatasetId};
use crate::qc::AutoQcResult;
use crate::sensor_value::{SensorValue, SensorValueRecord};
use crate::store::{DatasetSensorValues, SensorAssignments};
use chrono::{DateTime, Utc};
use postgres::{Client, NoTls};
use std::env;

pub const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS sensor_values (
        id BIGSERIAL PRIMARY KEY,
        dataset_id BIGINT NOT NULL,
        file_column BIGINT NOT NULL,
        date TIMESTAMPTZ NOT NULL,
        value TEXT,
        auto_qc TEXT,
        user_qc_flag INTEGER NOT NULL,
        user_qc_message TEXT,
        UNIQUE (dataset_id, file_column, date)
    )
";

/// Connects using `DATABASE_URL`, read from the environment or `.env`.
pub fn connect() -> Result<Client, DbError> {
    dotenv::dotenv().ok();
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingUrl)?;
    let client = Client::connect(&database_url, NoTls)?;
    log::debug!(target: "db", "connected to database");
    Ok(client)
}

pub fn create_schema(client: &mut Client) -> Result<(), DbError> {
    client.batch_execute(SCHEMA_SQL)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn decode_flag(code: i32) -> Result<Flag, DbError> {
    Flag::from_code(code).ok_or(DbError::UnknownFlag(code))
}

fn decode_auto_qc(json: Option<&str>) -> Result<AutoQcResult, DbError> {
    match json {
        Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(text)?),
        _ => Ok(AutoQcResult::new()),
    }
}

/// Empty results are stored as NULL.
fn encode_auto_qc(auto_qc: &AutoQcResult) -> Result<Option<String>, DbError> {
    if auto_qc.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(auto_qc)?))
    }
}

fn non_empty(message: String) -> Option<String> {
    if message.is_empty() { None } else { Some(message) }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// All stored values of a dataset, ordered by column then time.
pub fn load_sensor_values(
    client: &mut Client,
    dataset_id: DatasetId,
) -> Result<Vec<SensorValue>, DbError> {
    let rows = client.query(
        "SELECT id, file_column, date, value, auto_qc, user_qc_flag, user_qc_message
         FROM sensor_values
         WHERE dataset_id = $1
         ORDER BY file_column, date",
        &[&dataset_id],
    )?;

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let auto_qc: Option<String> = row.get(4);
        let record = SensorValueRecord {
            id: row.get(0),
            dataset_id,
            column_id: row.get::<_, ColumnId>(1),
            time: row.get::<_, DateTime<Utc>>(2),
            value: row.get(3),
            auto_qc: decode_auto_qc(auto_qc.as_deref())?,
            user_qc_flag: decode_flag(row.get(5))?,
            user_qc_message: row.get(6),
        };
        values.push(SensorValue::from(record));
    }

    log::debug!(target: "db", "loaded {} values for dataset {}", values.len(), dataset_id);
    Ok(values)
}

/// Loads a dataset into an in-memory store.
pub fn load_dataset(
    client: &mut Client,
    dataset_id: DatasetId,
    assignments: SensorAssignments,
) -> Result<DatasetSensorValues, DbError> {
    let mut store = DatasetSensorValues::new(dataset_id, assignments);
    for value in load_sensor_values(client, dataset_id)? {
        store.insert(value)?;
    }
    log::info!(target: "db", "dataset {}: {} values loaded", dataset_id, store.len());
    Ok(store)
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Writes every dirty, saveable value in one transaction and marks the
/// store clean. New values receive their database ids. Returns the number
/// of rows written.
pub fn save_sensor_values(
    client: &mut Client,
    store: &mut DatasetSensorValues,
) -> Result<usize, DbError> {
    let pending: Vec<_> = store
        .dirty_values()
        .into_iter()
        .filter(|v| v.can_be_saved())
        .collect();

    if pending.is_empty() {
        return Ok(0);
    }

    let mut new_ids = Vec::new();
    let mut transaction = client.transaction()?;

    for value in &pending {
        let auto_qc = encode_auto_qc(value.auto_qc())?;
        let flag = value.user_qc_flag(false).code();
        let message = non_empty(value.user_qc_message(false));

        if value.is_in_database() {
            transaction.execute(
                "UPDATE sensor_values
                 SET value = $1, auto_qc = $2, user_qc_flag = $3, user_qc_message = $4
                 WHERE id = $5",
                &[&value.value(), &auto_qc, &flag, &message, &value.id()],
            )?;
        } else {
            let row = transaction.query_one(
                "INSERT INTO sensor_values
                 (dataset_id, file_column, date, value, auto_qc, user_qc_flag, user_qc_message)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id",
                &[
                    &value.dataset_id(),
                    &value.column_id(),
                    &value.time(),
                    &value.value(),
                    &auto_qc,
                    &flag,
                    &message,
                ],
            )?;
            new_ids.push((value.column_id(), value.time(), row.get::<_, i64>(0)));
        }
    }

    transaction.commit()?;

    for (column, time, id) in new_ids {
        store.update(column, time, |v| v.set_id(id));
    }
    store.clear_dirty_flags();

    log::info!(
        target: "db",
        "dataset {}: saved {} values",
        store.dataset_id(),
        pending.len()
    );
    Ok(pending.len())
}
