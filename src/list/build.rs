//! Construction of derived values from a list's members.

use super::mode::MeasurementMode;
use super::value::{ListValueData, SensorValuesListValue};
use crate::config::ResolutionConfig;
use crate::error::ProcessingError;
use crate::flag::Flag;
use crate::model::{SensorType, QC_MESSAGE_SEPARATOR};
use crate::numeric::{midpoint, seconds_between, MeanCalculator};
use crate::sensor_value::SharedSensorValue;
use crate::store::DatasetContext;

/// Everything the builders need besides the members themselves.
pub(crate) struct BuildContext<'a> {
    pub sensor_type: &'a SensorType,
    pub context: &'a dyn DatasetContext,
    pub config: &'a ResolutionConfig,
}

/// Builds the derived values for `members` (sorted by time) under `mode`.
pub(crate) fn build_values(
    members: &[SharedSensorValue],
    mode: MeasurementMode,
    ctx: &BuildContext<'_>,
) -> Result<Vec<SensorValuesListValue>, ProcessingError> {
    match mode {
        MeasurementMode::Continuous => Ok(build_continuous(members, ctx)),
        MeasurementMode::Periodic if contains_text(members) => Ok(build_periodic_text(members, ctx)),
        MeasurementMode::Periodic => build_periodic_numeric(members, ctx),
    }
}

/// `true` if any member has a non-blank payload that is not a number.
pub(crate) fn contains_text(members: &[SharedSensorValue]) -> bool {
    members
        .iter()
        .any(|v| !v.no_value() && !v.is_blank() && !v.is_numeric())
}

/// One value per member that has a payload and is not FLUSHING.
fn build_continuous(
    members: &[SharedSensorValue],
    ctx: &BuildContext<'_>,
) -> Vec<SensorValuesListValue> {
    members
        .iter()
        .filter(|v| !v.no_value() && !v.is_flushing())
        .map(|v| SensorValuesListValue::from_sensor_value(v, ctx.sensor_type, ctx.context))
        .collect()
}

/// Groups runs of numeric members and reduces each run to its mean.
fn build_periodic_numeric(
    members: &[SharedSensorValue],
    ctx: &BuildContext<'_>,
) -> Result<Vec<SensorValuesListValue>, ProcessingError> {
    let limit = ctx.config.continuous_limit_secs;
    let mut output = Vec::new();
    let mut group: Vec<SharedSensorValue> = Vec::new();

    for value in members.iter().filter(|v| !v.is_nan() && !v.is_flushing()) {
        if let Some(last) = group.last() {
            if seconds_between(last.time(), value.time()) > limit {
                output.push(aggregate_numeric(&group, ctx.sensor_type, ctx.context)?);
                group.clear();
            }
        }
        group.push(value.clone());
    }

    if !group.is_empty() {
        output.push(aggregate_numeric(&group, ctx.sensor_type, ctx.context)?);
    }

    Ok(output)
}

/// Groups runs of identical strings. Each group takes the value, flag
/// and message of its first member.
fn build_periodic_text(
    members: &[SharedSensorValue],
    ctx: &BuildContext<'_>,
) -> Vec<SensorValuesListValue> {
    let limit = ctx.config.continuous_limit_secs;
    let mut output = Vec::new();
    let mut group: Vec<SharedSensorValue> = Vec::new();

    for value in members.iter().filter(|v| !v.is_blank() && !v.is_flushing()) {
        if let (Some(first), Some(last)) = (group.first(), group.last()) {
            if value.value() != first.value()
                || seconds_between(last.time(), value.time()) > limit
            {
                output.push(text_group(&group, ctx));
                group.clear();
            }
        }
        group.push(value.clone());
    }

    if !group.is_empty() {
        output.push(text_group(&group, ctx));
    }

    output
}

fn text_group(group: &[SharedSensorValue], ctx: &BuildContext<'_>) -> SensorValuesListValue {
    let first = &group[0];
    let start = first.time();
    let end = group[group.len() - 1].time();

    SensorValuesListValue::new(
        start,
        end,
        midpoint(start, end),
        group.to_vec(),
        ctx.sensor_type.clone(),
        ListValueData::Text(first.value().unwrap_or_default().to_string()),
        first.display_flag(),
        ctx.context.qc_message(first, false),
    )
}

/// Reduces a set of members (sorted by time) to a single numeric value.
///
/// Missing and FLUSHING members are ignored. Of the rest, only those in
/// the best quality class present (GOOD, then QUESTIONABLE, then BAD) are
/// averaged; ASSUMED_GOOD counts as GOOD. The span covers every numeric
/// member considered, whatever its flag, or every member when none is
/// numeric. A text payload among the averaged members makes the value NaN.
pub(crate) fn aggregate_numeric(
    members: &[SharedSensorValue],
    sensor_type: &SensorType,
    context: &dyn DatasetContext,
) -> Result<SensorValuesListValue, ProcessingError> {
    let usable: Vec<&SharedSensorValue> = members
        .iter()
        .filter(|v| !v.no_value() && !v.is_flushing())
        .collect();

    let Some(first) = usable.first() else {
        return Err(ProcessingError::EmptyGroup);
    };

    let chosen = usable
        .iter()
        .filter_map(|v| v.display_flag().simple())
        .reduce(Flag::best_of)
        .ok_or(ProcessingError::NoValidFlags(first.time()))?;

    let used: Vec<SharedSensorValue> = usable
        .iter()
        .filter(|v| v.display_flag().simple() == Some(chosen))
        .map(|v| (*v).clone())
        .collect();

    let numeric_times: Vec<_> = usable.iter().filter(|v| v.is_numeric()).map(|v| v.time()).collect();
    let (start, end) = match (numeric_times.first(), numeric_times.last()) {
        (Some(&start), Some(&end)) => (start, end),
        _ => (first.time(), usable[usable.len() - 1].time()),
    };

    let has_text = used.iter().any(|v| !v.is_numeric());
    if has_text {
        log::debug!(target: "list", "text among {} values from {}; mean is NaN", sensor_type, start);
    }

    let mean: MeanCalculator = used.iter().map(|v| v.double_value()).collect();
    let message = used
        .iter()
        .map(|v| context.qc_message(v, false))
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(QC_MESSAGE_SEPARATOR);

    Ok(SensorValuesListValue::new(
        start,
        end,
        midpoint(start, end),
        used,
        sensor_type.clone(),
        ListValueData::Numeric(if has_text { f64::NAN } else { mean.mean() }),
        chosen,
        message,
    ))
}
