//! Derived values produced by a [`super::SensorValuesList`].

use crate::flag::Flag;
use crate::model::{SensorType, QC_MESSAGE_SEPARATOR};
use crate::numeric::interpolate_at;
use crate::sensor_value::SharedSensorValue;
use crate::store::DatasetContext;
use chrono::{DateTime, Utc};
use std::fmt;

/// The payload of a derived value.
#[derive(Debug, Clone, PartialEq)]
pub enum ListValueData {
    Numeric(f64),
    Text(String),
}

impl fmt::Display for ListValueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListValueData::Numeric(v) => write!(f, "{}", v),
            ListValueData::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A value derived from one or more members of a list: either a single
/// reading, the mean of a group, a group's string, or an interpolation
/// between two of these.
///
/// `start_time..=end_time` is the span the value covers; `time` is the
/// nominal timestamp it is reported at.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorValuesListValue {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    time: DateTime<Utc>,
    sources: Vec<SharedSensorValue>,
    sensor_type: SensorType,
    value: ListValueData,
    flag: Flag,
    qc_message: String,
    interpolated: bool,
}

impl SensorValuesListValue {
    /// A value covering a span of members.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        time: DateTime<Utc>,
        sources: Vec<SharedSensorValue>,
        sensor_type: SensorType,
        value: ListValueData,
        flag: Flag,
        qc_message: String,
    ) -> Self {
        SensorValuesListValue {
            start_time,
            end_time,
            time,
            sources,
            sensor_type,
            value,
            flag,
            qc_message,
            interpolated: false,
        }
    }

    /// A value standing for exactly one reading.
    pub(crate) fn from_sensor_value(
        source: &SharedSensorValue,
        sensor_type: &SensorType,
        context: &dyn DatasetContext,
    ) -> Self {
        let value = if source.is_numeric() {
            ListValueData::Numeric(source.double_value())
        } else {
            ListValueData::Text(source.value().unwrap_or_default().to_string())
        };

        let time = source.time();
        SensorValuesListValue::new(
            time,
            time,
            time,
            vec![source.clone()],
            sensor_type.clone(),
            value,
            source.display_flag(),
            context.qc_message(source, false),
        )
    }

    /// This value reported at another timestamp, keeping its span.
    pub(crate) fn retimed(&self, time: DateTime<Utc>) -> Self {
        SensorValuesListValue {
            time,
            ..self.clone()
        }
    }

    /// This value standing in for a different timestamp, marked as
    /// interpolated.
    pub(crate) fn interpolated_at(&self, time: DateTime<Utc>) -> Self {
        SensorValuesListValue {
            time,
            interpolated: true,
            ..self.clone()
        }
    }

    /// Linear interpolation between two values at `time`. The span runs
    /// from the first value's start to the second's end, the sources are
    /// the union of both, and the flag is the worse of the two.
    ///
    /// Text values cannot be interpolated; the earlier value is carried
    /// forward instead.
    pub(crate) fn interpolate(
        first: &SensorValuesListValue,
        second: &SensorValuesListValue,
        time: DateTime<Utc>,
    ) -> Self {
        let value = match (&first.value, &second.value) {
            (ListValueData::Numeric(a), ListValueData::Numeric(b)) => {
                ListValueData::Numeric(interpolate_at(first.time, *a, second.time, *b, time))
            }
            _ => return first.interpolated_at(time),
        };

        let mut sources = first.sources.clone();
        for source in &second.sources {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources.sort_by_key(|s| s.time());

        SensorValuesListValue {
            start_time: first.start_time.min(second.start_time),
            end_time: first.end_time.max(second.end_time),
            time,
            sources,
            sensor_type: first.sensor_type.clone(),
            value,
            flag: Flag::worst_of(first.flag, second.flag),
            qc_message: combine_messages(&first.qc_message, &second.qc_message),
            interpolated: true,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The readings this value was derived from, in time order.
    pub fn sources(&self) -> &[SharedSensorValue] {
        &self.sources
    }

    pub fn sensor_type(&self) -> &SensorType {
        &self.sensor_type
    }

    pub fn value(&self) -> &ListValueData {
        &self.value
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.value, ListValueData::Numeric(_))
    }

    /// The numeric payload; NaN for text values.
    pub fn double_value(&self) -> f64 {
        match self.value {
            ListValueData::Numeric(v) => v,
            ListValueData::Text(_) => f64::NAN,
        }
    }

    pub fn string_value(&self) -> String {
        self.value.to_string()
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn qc_message(&self) -> &str {
        &self.qc_message
    }

    pub fn is_interpolated(&self) -> bool {
        self.interpolated
    }

    /// `true` if `time` falls inside this value's span (inclusive).
    pub fn covers(&self, time: DateTime<Utc>) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

impl fmt::Display for SensorValuesListValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} = {} [{}]",
            self.time.format("%Y-%m-%dT%H:%M:%SZ"),
            self.sensor_type,
            self.value,
            self.flag
        )?;
        if self.interpolated {
            write!(f, " (interpolated)")?;
        }
        Ok(())
    }
}

/// Joins two QC messages, skipping empty ones and repeats.
fn combine_messages(first: &str, second: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in first
        .split(QC_MESSAGE_SEPARATOR)
        .chain(second.split(QC_MESSAGE_SEPARATOR))
    {
        let part = part.trim();
        if !part.is_empty() && !parts.contains(&part) {
            parts.push(part);
        }
    }
    parts.join(QC_MESSAGE_SEPARATOR)
}
