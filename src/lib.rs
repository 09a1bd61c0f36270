//! Time-resolution engine for quality-controlled oceanographic sensor data.
//!
//! Raw readings ([`SensorValue`]) are collected per sensor type in a
//! [`SensorValuesList`], which works out whether the instrument measures
//! continuously or in periodic bursts and answers "what was the best value
//! at this time, and how good is it?" with quality-aware interpolation.

pub mod config;
pub mod db;
pub mod error;
pub mod flag;
pub mod list;
pub mod logging;
pub mod model;
pub mod numeric;
pub mod qc;
pub mod registry;
pub mod sensor_value;
pub mod store;

pub use config::{ResolutionConfig, ServiceConfig};
pub use error::{ListError, ProcessingError, Result};
pub use flag::Flag;
pub use list::{ListValueData, MeasurementMode, SensorValuesList, SensorValuesListValue};
pub use model::SensorType;
pub use registry::ListRegistry;
pub use sensor_value::{SensorValue, SharedSensorValue};
pub use store::{DatasetContext, DatasetSensorValues, SensorAssignments, SharedContext};
